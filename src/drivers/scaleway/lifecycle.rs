//! Server lifecycle calls against the Scaleway Instances API.

use std::future::Future;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use scaleway_rs::{
    ScalewayApi, ScalewayCreateInstanceBuilder, ScalewayError, ScalewayImage,
    ScalewayListInstanceImagesBuilder,
};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::types::ServerSnapshot;
use super::{ScalewayDriver, ScalewayDriverError};
use crate::wait::poll_until;

const SSH_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const SERVER_TAG: &str = "docker-machine";

impl ScalewayDriver {
    fn is_instance_type_error(&self, api_err: &scaleway_rs::ScalewayApiError) -> bool {
        matches!(api_err.resource.as_deref(), Some("commercial_type"))
            || api_err
                .resource_id
                .as_deref()
                .is_some_and(|id| id == self.commercial_type)
            || (api_err.etype == "invalid_arguments"
                && api_err
                    .message
                    .to_ascii_lowercase()
                    .contains("commercial_type"))
    }

    pub(super) async fn fetch_server(
        &self,
        api: &ScalewayApi,
        server_id: &str,
    ) -> Result<Option<ServerSnapshot>, ScalewayDriverError> {
        let mut servers = api
            .list_instances(&self.zone)
            .servers(server_id)
            .per_page(1)
            .run_async()
            .await?;
        Ok(servers.pop().map(ServerSnapshot::from_instance))
    }

    pub(super) async fn provision(&mut self) -> Result<(), ScalewayDriverError> {
        self.validate()?;
        let api = self.api();
        let image_id = self.resolve_image_id(&api).await?;

        tracing::info!(zone = %self.zone, image = %image_id, "creating server");
        let server = match ScalewayCreateInstanceBuilder::new(
            api.clone(),
            &self.zone,
            &self.base.machine_name,
            &self.commercial_type,
        )
        .image(&image_id)
        .project(&self.project_id)
        .routed_ip_enabled(true)
        .enable_ipv6(self.enable_ipv6)
        .tags(vec![String::from(SERVER_TAG)])
        .run_async()
        .await
        {
            Ok(server) => server,
            Err(ScalewayError::Api(api_err)) if self.is_instance_type_error(&api_err) => {
                return Err(ScalewayDriverError::InstanceTypeUnavailable {
                    instance_type: self.commercial_type.clone(),
                    zone: self.zone.clone(),
                });
            }
            Err(other) => return Err(other.into()),
        };

        let snapshot = ServerSnapshot::from_instance(server);
        self.server_id = Some(snapshot.id.as_str().to_owned());
        self.perform_if_needed(&api, &snapshot, "poweron", "running")
            .await?;

        let address = self.wait_for_public_ip(&api, snapshot.id.as_str()).await?;
        self.base.ip_address = address.to_string();
        self.wait_for_ssh(snapshot.id.as_str(), address).await
    }

    async fn perform_if_needed(
        &self,
        api: &ScalewayApi,
        snapshot: &ServerSnapshot,
        action: &str,
        target_status: &str,
    ) -> Result<(), ScalewayDriverError> {
        if snapshot.status.as_str() == target_status {
            return Ok(());
        }
        if !snapshot.allows(action) {
            return Err(ScalewayDriverError::ActionNotAllowed {
                server_id: snapshot.id.as_str().to_owned(),
                action: action.to_owned(),
                state: snapshot.status.as_str().to_owned(),
            });
        }
        api.perform_instance_action_async(&self.zone, snapshot.id.as_str(), action)
            .await?;
        Ok(())
    }

    async fn current_snapshot(
        &self,
        api: &ScalewayApi,
    ) -> Result<ServerSnapshot, ScalewayDriverError> {
        let server_id = self.current_server_id()?;
        self.fetch_server(api, &server_id)
            .await?
            .ok_or(ScalewayDriverError::ServerNotFound { server_id })
    }

    pub(super) async fn power_on(&mut self) -> Result<(), ScalewayDriverError> {
        let api = self.api();
        let snapshot = self.current_snapshot(&api).await?;
        self.perform_if_needed(&api, &snapshot, "poweron", "running")
            .await?;
        let address = self.wait_for_public_ip(&api, snapshot.id.as_str()).await?;
        self.base.ip_address = address.to_string();
        Ok(())
    }

    pub(super) async fn power_off(&mut self) -> Result<(), ScalewayDriverError> {
        let api = self.api();
        let snapshot = self.current_snapshot(&api).await?;
        self.perform_if_needed(&api, &snapshot, "poweroff", "stopped")
            .await?;
        self.wait_for_status(&api, snapshot.id.as_str(), &["stopped", "stopped in place"])
            .await
    }

    pub(super) async fn reboot(&mut self) -> Result<(), ScalewayDriverError> {
        let api = self.api();
        let snapshot = self.current_snapshot(&api).await?;
        if !snapshot.allows("reboot") {
            return Err(ScalewayDriverError::ActionNotAllowed {
                server_id: snapshot.id.as_str().to_owned(),
                action: String::from("reboot"),
                state: snapshot.status.as_str().to_owned(),
            });
        }
        api.perform_instance_action_async(&self.zone, snapshot.id.as_str(), "reboot")
            .await?;
        let address = self.wait_for_public_ip(&api, snapshot.id.as_str()).await?;
        self.base.ip_address = address.to_string();
        Ok(())
    }

    pub(super) async fn destroy(&mut self) -> Result<(), ScalewayDriverError> {
        let Some(server_id) = self.server_id.clone() else {
            return Ok(());
        };
        let api = self.api();
        let Some(snapshot) = self.fetch_server(&api, &server_id).await? else {
            tracing::info!(%server_id, "server already gone");
            return Ok(());
        };

        if snapshot.allows("terminate") {
            api.perform_instance_action_async(&self.zone, &server_id, "terminate")
                .await?;
        } else {
            api.delete_instance_async(&self.zone, &server_id).await?;
        }
        self.wait_until_gone(&api, &server_id).await?;
        self.server_id = None;
        Ok(())
    }

    async fn wait_for_status(
        &self,
        api: &ScalewayApi,
        server_id: &str,
        wanted: &[&str],
    ) -> Result<(), ScalewayDriverError> {
        let this = &*self;
        poll_until("server state", self.schedule, move || async move {
            let snapshot = this.fetch_server(api, server_id).await?.ok_or_else(|| {
                ScalewayDriverError::ServerNotFound {
                    server_id: server_id.to_owned(),
                }
            })?;
            tracing::info!(
                current = snapshot.status.as_str(),
                ?wanted,
                "waiting for server state"
            );
            Ok::<_, ScalewayDriverError>(wanted.contains(&snapshot.status.as_str()).then_some(()))
        })
        .await
        .map_err(|err| ScalewayDriverError::from_wait(err, server_id))
    }

    async fn wait_for_public_ip(
        &self,
        api: &ScalewayApi,
        server_id: &str,
    ) -> Result<IpAddr, ScalewayDriverError> {
        let saw_running = AtomicBool::new(false);
        let seen = &saw_running;
        let this = &*self;
        let result = poll_until("public address", self.schedule, move || async move {
            let Some(server) = this.fetch_server(api, server_id).await? else {
                return Ok::<_, ScalewayDriverError>(None);
            };
            if server.status.as_str() != "running" {
                return Ok(None);
            }
            seen.store(true, Ordering::Relaxed);
            Ok(server
                .public_ip
                .as_deref()
                .and_then(|ip| IpAddr::from_str(ip).ok()))
        })
        .await;

        match result {
            Ok(address) => Ok(address),
            Err(_) if saw_running.load(Ordering::Relaxed) => {
                Err(ScalewayDriverError::MissingPublicIp {
                    server_id: server_id.to_owned(),
                })
            }
            Err(err) => Err(ScalewayDriverError::from_wait(err, server_id)),
        }
    }

    async fn wait_for_ssh(
        &self,
        server_id: &str,
        address: IpAddr,
    ) -> Result<(), ScalewayDriverError> {
        let port = self.base.ssh_port;
        poll_until("ssh", self.schedule, move || async move {
            let connect = timeout(SSH_CONNECT_TIMEOUT, TcpStream::connect((address, port))).await;
            Ok::<_, ScalewayDriverError>(matches!(connect, Ok(Ok(_))).then_some(()))
        })
        .await
        .map_err(|err| ScalewayDriverError::from_wait(err, server_id))
    }

    async fn wait_until_gone(
        &self,
        api: &ScalewayApi,
        server_id: &str,
    ) -> Result<(), ScalewayDriverError> {
        let this = &*self;
        poll_until("removal", self.schedule, move || async move {
            let gone = this.fetch_server(api, server_id).await?.is_none();
            Ok::<_, ScalewayDriverError>(gone.then_some(()))
        })
        .await
        .map_err(|err| match err {
            crate::wait::WaitError::Timeout { .. } => ScalewayDriverError::ResidualResource {
                server_id: server_id.to_owned(),
            },
            crate::wait::WaitError::Check(inner) => inner,
        })
    }

    pub(super) async fn resolve_image_id(
        &self,
        api: &ScalewayApi,
    ) -> Result<String, ScalewayDriverError> {
        self.resolve_image_id_with(
            || async move {
                let mut scoped = ScalewayListInstanceImagesBuilder::new(api.clone(), &self.zone)
                    .public(true)
                    .project(&self.project_id)
                    .name(&self.image)
                    .arch(&self.architecture);
                if let Some(org) = &self.organization_id {
                    scoped = scoped.organization(org);
                }
                scoped.run_async().await.map_err(ScalewayDriverError::from)
            },
            || async move {
                ScalewayListInstanceImagesBuilder::new(api.clone(), &self.zone)
                    .public(true)
                    .name(&self.image)
                    .arch(&self.architecture)
                    .run_async()
                    .await
                    .map_err(ScalewayDriverError::from)
            },
        )
        .await
    }

    pub(super) async fn resolve_image_id_with<FutA, FutB, FetchA, FetchB>(
        &self,
        project_fetch: FetchA,
        public_fetch: FetchB,
    ) -> Result<String, ScalewayDriverError>
    where
        FetchA: FnOnce() -> FutA,
        FetchB: FnOnce() -> FutB,
        FutA: Future<Output = Result<Vec<ScalewayImage>, ScalewayDriverError>>,
        FutB: Future<Output = Result<Vec<ScalewayImage>, ScalewayDriverError>>,
    {
        let project_images = self.filter_images(project_fetch().await?);
        let candidates = if project_images.is_empty() {
            self.filter_images(public_fetch().await?)
        } else {
            project_images
        };
        self.select_image_id(candidates)
    }

    pub(super) fn select_image_id(
        &self,
        mut candidates: Vec<ScalewayImage>,
    ) -> Result<String, ScalewayDriverError> {
        candidates.sort_by(|lhs, rhs| rhs.creation_date.cmp(&lhs.creation_date));
        candidates
            .into_iter()
            .next()
            .map(|image| image.id)
            .ok_or_else(|| ScalewayDriverError::ImageNotFound {
                label: self.image.clone(),
                arch: self.architecture.clone(),
                zone: self.zone.clone(),
            })
    }

    pub(super) fn filter_images(&self, images: Vec<ScalewayImage>) -> Vec<ScalewayImage> {
        images
            .into_iter()
            .filter(|image| image.arch == self.architecture)
            .filter(|image| image.state == "available")
            .collect()
    }
}
