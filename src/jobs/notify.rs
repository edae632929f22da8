use anyhow::Context;
use chrono::Utc;
use tokio::runtime::Handle;
use tracing::{error, info};

use crate::engine::{
    ChildJob, ChildTask, ContentSource, DeploySource, InFlight, Job, JobContext, JobHandle,
};
use crate::notify::{DeployNotice, WebhookClient};

/// Tells a webhook that content has been deployed.
///
/// The request is advanced from the job's tick and the job completes when
/// the endpoint answers. Starting it outside a tokio runtime fails the job.
pub struct NotifyDeploy {
    client: WebhookClient,
    request: InFlight,
}

impl NotifyDeploy {
    pub fn new(client: WebhookClient) -> Self {
        Self {
            client,
            request: InFlight::default(),
        }
    }
}

impl ChildTask<DeploySource> for NotifyDeploy {
    fn start_child(&mut self, ctx: &JobContext<'_>, source: &JobHandle) -> anyhow::Result<()> {
        Handle::try_current().context("no tokio runtime to send the deploy notice on")?;
        let deployed = source
            .deployed_path()
            .with_context(|| format!("'{}' no longer reports a deployed folder", source.label()))?;
        let groups = ctx
            .find_ancestor::<ContentSource>()
            .and_then(|job| job.ledger().map(|l| l.group_counts()))
            .unwrap_or_default();

        let notice = DeployNotice {
            job: ctx.label().to_string(),
            deployed_path: deployed.to_string_lossy().into_owned(),
            groups,
            sent_at: Utc::now(),
        };
        let client = self.client.clone();
        let completer = ctx.completer();
        let label = ctx.label().to_string();

        self.request.set(async move {
            match client.post(&notice).await {
                Ok(ack) => {
                    info!(job = %label, url = %client.url(), ack = ?ack.id, "deploy notice sent");
                    completer.succeed();
                }
                Err(err) => {
                    error!(job = %label, url = %client.url(), error = %err, "deploy notice failed");
                    completer.fail(format!("deploy notice to {} failed: {err}", client.url()));
                }
            }
        });
        Ok(())
    }

    fn poll(&mut self, _ctx: &JobContext<'_>) {
        self.request.poll();
    }
}

pub fn notify_deploy(label: impl Into<String>, client: WebhookClient) -> JobHandle {
    Job::new(label, ChildJob::<DeploySource, _>::new(NotifyDeploy::new(client)))
}
