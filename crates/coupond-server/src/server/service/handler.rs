//! gRPC entry point for campaign management and coupon issuance.
//!
//! [`IssuanceService`] implements the `coupon.v1.CouponService` contract. It
//! validates requests, delegates issuance to the [`Issuer`], and owns the two
//! long-lived background tasks (the batched issuance writer and the
//! activation scheduler), whose lifecycle is tied to the service object
//! through a shared cancellation token.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use coupond_core::proto::coupon_service_server::CouponService;
use coupond_core::proto::{
    CreateCampaignRequest, CreateCampaignResponse, GetCampaignRequest, GetCampaignResponse,
    IssueCouponRequest, IssueCouponResponse,
};
use coupond_core::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::server::codegen::writer::run_writer;
use crate::server::codegen::CodeGenerator;
use crate::server::config::ServerConfig;
use crate::server::issuance::Issuer;
use crate::server::scheduler::run_activator;
use crate::server::store::{CouponStore, CounterStore};

/// The coupon issuance gRPC service.
///
/// Cloning is cheap; every clone shares the same stores, code pool and
/// background tasks.
#[derive(Clone)]
pub struct IssuanceService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    store: Arc<dyn CouponStore>,
    counters: Arc<dyn CounterStore>,
    issuer: Issuer,
    shutdown: CancellationToken,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    shutdown_timeout: Duration,
}

impl IssuanceService {
    /// Assembles the service and spawns the writer and scheduler tasks.
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn CouponStore>,
        counters: Arc<dyn CounterStore>,
    ) -> Self {
        let generator = Arc::new(CodeGenerator::new(
            store.clone(),
            config.code_batch_size,
            config.refill_threshold,
        ));
        let issuer = Issuer::new(store.clone(), counters.clone(), generator.clone());

        let shutdown = CancellationToken::new();
        let tasks = vec![
            tokio::spawn(run_writer(
                generator,
                config.writer_period,
                shutdown.clone(),
            )),
            tokio::spawn(run_activator(
                store.clone(),
                counters.clone(),
                config.scheduler_period,
                shutdown.clone(),
            )),
        ];

        Self {
            inner: Arc::new(ServiceInner {
                store,
                counters,
                issuer,
                shutdown,
                tasks: tokio::sync::Mutex::new(tasks),
                shutdown_timeout: config.shutdown_timeout,
            }),
        }
    }

    /// Initiates a graceful shutdown.
    ///
    /// New requests are refused, the background tasks are cancelled, and the
    /// writer's final flush is awaited up to the shutdown timeout.
    pub async fn shutdown(&self) {
        tracing::info!("stopping background tasks");
        self.inner.shutdown.cancel();

        let mut tasks = self.inner.tasks.lock().await;
        for task in tasks.drain(..) {
            match tokio::time::timeout(self.inner.shutdown_timeout, task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::error!(%err, "background task failed"),
                Err(_) => {
                    tracing::warn!("background task did not stop within the shutdown timeout");
                }
            }
        }
    }

    fn check_accepting_requests(&self) -> Result<(), Status> {
        if self.inner.shutdown.is_cancelled() {
            return Err(Error::ServiceShutdown.into());
        }
        Ok(())
    }
}

/// Campaign ids travel as strings; anything that does not parse as a UUID
/// cannot match a row, so it reports as not-found rather than invalid.
fn parse_campaign_id(raw: &str) -> Result<Uuid, Error> {
    raw.parse::<Uuid>().map_err(|_| Error::not_found(raw))
}

#[tonic::async_trait]
impl CouponService for IssuanceService {
    async fn create_campaign(
        &self,
        req: Request<CreateCampaignRequest>,
    ) -> Result<Response<CreateCampaignResponse>, Status> {
        self.check_accepting_requests()?;
        let msg = req.into_inner();

        let name = msg.name.trim();
        if name.is_empty() {
            return Err(Error::invalid_request("campaign name cannot be empty").into());
        }
        if msg.coupon_limit <= 0 {
            return Err(Error::invalid_request("coupon limit must be greater than 0").into());
        }
        let start_time = DateTime::parse_from_rfc3339(&msg.start_time)
            .map_err(|err| Error::invalid_request(format!("invalid start_time format: {err}")))?
            .with_timezone(&Utc);

        let campaign_id = self
            .inner
            .store
            .insert_campaign(name, start_time, msg.coupon_limit)
            .await?;

        // The counter must exist before the activation entry: a campaign that
        // activates without a counter would report itself exhausted.
        self.inner
            .counters
            .init_counter(campaign_id, msg.coupon_limit)
            .await?;
        self.inner
            .counters
            .schedule_activation(campaign_id, start_time.timestamp())
            .await?;

        tracing::info!(
            %campaign_id,
            name,
            start_time = %start_time,
            coupon_limit = msg.coupon_limit,
            "campaign created"
        );

        Ok(Response::new(CreateCampaignResponse {
            campaign_id: campaign_id.to_string(),
        }))
    }

    async fn get_campaign(
        &self,
        req: Request<GetCampaignRequest>,
    ) -> Result<Response<GetCampaignResponse>, Status> {
        let msg = req.into_inner();
        let campaign_id = parse_campaign_id(&msg.campaign_id)?;

        let campaign = self
            .inner
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| Error::not_found(campaign_id))?;
        let issued_coupons = self.inner.store.list_issued_codes(campaign_id).await?;

        Ok(Response::new(GetCampaignResponse {
            name: campaign.name,
            start_time: campaign
                .start_time
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            status: campaign.status.as_str().to_owned(),
            issued_coupons,
        }))
    }

    async fn issue_coupon(
        &self,
        req: Request<IssueCouponRequest>,
    ) -> Result<Response<IssueCouponResponse>, Status> {
        self.check_accepting_requests()?;
        let msg = req.into_inner();
        let campaign_id = parse_campaign_id(&msg.campaign_id)?;

        let coupon_code = self.inner.issuer.issue(campaign_id).await?;

        Ok(Response::new(IssueCouponResponse { coupon_code }))
    }
}
