//! Job orchestration: from a prompt to a paid, mined `StableDiffusion`
//! transaction and on to the generated images.
//!
//! ## Flow
//!
//! ```text
//! wallet? ─▶ Submitting ─▶ currentJobID()+1 ─▶ StableDiffusion{value} ─▶ AwaitingConfirmation
//!                                                                             │ receipt
//!                                                                             ▼
//!                    Complete ◀── images observed / getImage polled ◀── GeneratingImages
//! ```
//!
//! Every step is mirrored into the [`StatusStore`]; failures are turned
//! into a truncated toast plus status error and returned to the caller.
//! Nothing is retried.

mod phase;

pub use phase::JobPhase;

use alloy_primitives::utils::parse_ether;
use futures::future::try_join_all;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::config::{AppConfig, IMAGE_COST, IMAGE_COUNT, MAX_ERROR_CHARS};
use crate::contract::{revert_reason, WaterlilyContract};
use crate::error::{ContractError, ContractResult, JobError, JobResult, RpcError};
use crate::images::ImageStore;
use crate::models::{ImageRecord, JobSubmission};
use crate::status::{ErrorFlag, SnackbarKind, StatusMessage, StatusState, StatusStore};
use crate::wallet::{WalletConnector, WalletProvider};

// =============================================================================
// User-facing texts
// =============================================================================

pub const WEB3_UNAVAILABLE: &str = "Web3 not available";
pub const WEB3_UNAVAILABLE_HELP: &str =
    "Please install and unlock a Web3 provider in your browser to use this application.";
pub const CONTRACT_CONNECTION_FAILED: &str = "Something went wrong connecting to contract";

pub const SUBMITTING: &str = "Submitting Waterlily job to the FVM network ...";
pub const CONFIRM_PAYMENT_TITLE: &str = "Waiting for user to confirm wallet payment";
pub const CONFIRM_PAYMENT_DESCRIPTION: &str = "Please check your wallet activity";

pub const AWAITING_BLOCK: &str =
    "Waiting for transaction to be included in a block on the FVM network...";
pub const AWAITING_BLOCK_TITLE: &str =
    "This could take awhile... please be patient while we mine the block!";

pub const GENERATING: &str = "Generating your unique images on Bacalhau...!";
pub const GENERATING_TITLE: &str =
    "Please be patient... This takes 30 seconds or so depending on demand.";

pub const EXPLORER_LINK_TEXT: &str = "Check Status in block explorer";
pub const TX_INCLUDED: &str = "Transaction included in block - creating images...!";
pub const IMAGES_GENERATED: &str = "Images have been generated - finalizing transaction...";

pub const JOB_SUCCEEDED: &str = "Successfully ran WaterLily Stable Diffusion Job";
pub const JOB_CANCELLED: &str = "Error Running Bacalhau Job";
pub const JOB_CANCELLED_HELP: &str = "Check logs for more info";

/// How a job leaves `GeneratingImages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionPolicy {
    /// Wait for the image side channel to report all images through
    /// [`JobOrchestrator::on_images_observed`]. The orchestrator itself
    /// never leaves `GeneratingImages`.
    #[default]
    External,
    /// Poll `getImage(id)` until it is complete or cancelled.
    Poll { interval: Duration, timeout: Duration },
}

/// Cut a message to [`MAX_ERROR_CHARS`] characters, marking the cut.
pub fn truncate_message(text: &str) -> String {
    if text.chars().count() > MAX_ERROR_CHARS {
        let head: String = text.chars().take(MAX_ERROR_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Failure inside the submission steps.
enum StepError {
    Contract(ContractError),
    Job(JobError),
}

impl From<ContractError> for StepError {
    fn from(err: ContractError) -> Self {
        StepError::Contract(err)
    }
}

impl From<JobError> for StepError {
    fn from(err: JobError) -> Self {
        StepError::Job(err)
    }
}

/// Claim on the single job slot, taken by [`JobOrchestrator::reserve`].
///
/// The slot stays taken until the job spending the ticket ends.
#[must_use = "the job slot stays taken until the ticket is run"]
pub struct JobTicket<P> {
    wallet: Arc<P>,
}

/// Drives one job at a time against the Waterlily contract.
///
/// Contract reads go to the node set with [`JobOrchestrator::with_reader`]
/// and fall back to the wallet when there is none.
pub struct JobOrchestrator<P> {
    config: AppConfig,
    wallet: Arc<WalletConnector<P>>,
    reader: Option<Arc<P>>,
    status: StatusStore,
    images: ImageStore,
    completion: CompletionPolicy,
    phase: RwLock<JobPhase>,
    current: RwLock<Option<JobSubmission>>,
    customer_images: RwLock<Vec<ImageRecord>>,
}

impl<P: WalletProvider> JobOrchestrator<P> {
    pub fn new(
        config: AppConfig,
        wallet: Arc<WalletConnector<P>>,
        status: StatusStore,
        images: ImageStore,
    ) -> Self {
        Self {
            config,
            wallet,
            reader: None,
            status,
            images,
            completion: CompletionPolicy::default(),
            phase: RwLock::new(JobPhase::Idle),
            current: RwLock::new(None),
            customer_images: RwLock::new(Vec::new()),
        }
    }

    pub fn with_completion(mut self, completion: CompletionPolicy) -> Self {
        self.completion = completion;
        self
    }

    /// Read the contracts through `reader` instead of the wallet.
    pub fn with_reader(mut self, reader: P) -> Self {
        self.reader = Some(Arc::new(reader));
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn wallet(&self) -> &WalletConnector<P> {
        &self.wallet
    }

    pub fn status(&self) -> &StatusStore {
        &self.status
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn phase(&self) -> JobPhase {
        *self.phase.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// The latest submission of this session.
    pub fn current_submission(&self) -> Option<JobSubmission> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Images of the connected account, as last loaded.
    pub fn customer_images(&self) -> Vec<ImageRecord> {
        self.customer_images
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pay for and submit one image-generation job.
    ///
    /// On success the job is left in [`JobPhase::GeneratingImages`] unless
    /// the completion policy polls the contract.
    pub async fn run_stable_diffusion_job(&self, prompt: &str, artist_id: &str) -> JobResult<JobSubmission> {
        let ticket = self.reserve()?;
        self.run_reserved(ticket, prompt, artist_id).await
    }

    /// Take the job slot without touching the chain.
    ///
    /// At most one caller succeeds until the job it starts ends; everyone
    /// else gets [`JobError::JobInFlight`].
    pub fn reserve(&self) -> JobResult<JobTicket<P>> {
        let Some(wallet) = self.wallet.provider() else {
            log::warn!("No wallet provider configured");
            self.status.update(|s| {
                s.is_error = ErrorFlag::Text(WEB3_UNAVAILABLE.into());
                s.is_message = true;
                s.message = StatusMessage::new(WEB3_UNAVAILABLE, WEB3_UNAVAILABLE_HELP);
            });
            return Err(JobError::EnvironmentUnavailable);
        };

        if self.phase().is_active() {
            return Err(JobError::JobInFlight);
        }
        let started = self.status.begin(|s| {
            *s = StatusState {
                is_loading: Some(SUBMITTING.into()),
                is_message: true,
                message: StatusMessage::new(CONFIRM_PAYMENT_TITLE, CONFIRM_PAYMENT_DESCRIPTION),
                ..StatusState::default()
            };
        });
        if !started {
            return Err(JobError::JobInFlight);
        }
        self.set_phase(JobPhase::Submitting)?;
        Ok(JobTicket { wallet })
    }

    /// Run the job a [`JobOrchestrator::reserve`] call made room for.
    pub async fn run_reserved(
        &self,
        ticket: JobTicket<P>,
        prompt: &str,
        artist_id: &str,
    ) -> JobResult<JobSubmission> {
        log::info!("Submitting job for artist {}: {:?}", artist_id, prompt);

        let price = match parse_ether(IMAGE_COST) {
            Ok(price) => price,
            Err(e) => return Err(self.fail(&ContractError::InvalidAmount(e.to_string()))),
        };
        let mut submission = JobSubmission::new(prompt, artist_id, price);
        self.remember(&submission);

        let bound = match self.wallet.primary_account() {
            Ok(account) => {
                let reader = self.reader.clone().unwrap_or_else(|| ticket.wallet.clone());
                WaterlilyContract::read_only(reader, &self.config)
                    .and_then(|contract| contract.with_signer(ticket.wallet, &account))
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };
        let contract = match bound {
            Ok(contract) => contract,
            Err(e) => {
                log::error!("Cannot bind contract to a signer: {}", e);
                self.status.set(StatusState {
                    is_error: ErrorFlag::Text(CONTRACT_CONNECTION_FAILED.into()),
                    ..StatusState::default()
                });
                self.set_phase(JobPhase::Failed)?;
                return Err(JobError::ConnectionFailure);
            }
        };

        match self.submit(&contract, &mut submission).await {
            Ok(()) => {}
            Err(StepError::Contract(e)) => {
                self.remember(&submission);
                return Err(self.fail(&e));
            }
            Err(StepError::Job(e)) => return Err(e),
        }
        self.remember(&submission);

        if let CompletionPolicy::Poll { interval, timeout } = self.completion {
            if let Some(job_id) = submission.predicted_job_id {
                self.poll_completion(&contract, job_id, interval, timeout).await?;
            }
        }
        Ok(submission)
    }

    /// Steps from the job counter read to the mined receipt.
    async fn submit(
        &self,
        contract: &WaterlilyContract<P>,
        submission: &mut JobSubmission,
    ) -> Result<(), StepError> {
        let counter = contract.current_job_id().await?;
        let next_job_id = counter
            .checked_add(1)
            .ok_or_else(|| ContractError::OutOfRange(counter.to_string()))?;
        submission.predicted_job_id = Some(next_job_id);

        let pending = contract
            .stable_diffusion(&submission.artist_id, &submission.prompt, submission.paid_amount)
            .await?;
        let hash = pending.hash.to_string();
        submission.transaction_hash = Some(hash.clone());
        self.remember(submission);

        self.set_phase(JobPhase::AwaitingConfirmation)?;
        let link = self.config.explorer_link(&hash);
        self.status.update(|s| {
            s.is_loading = Some(AWAITING_BLOCK.into());
            s.is_message = true;
            s.message = StatusMessage::new(AWAITING_BLOCK_TITLE, EXPLORER_LINK_TEXT).with_link(link.clone());
        });
        self.status.show_snackbar(
            SnackbarKind::Success,
            format!("Transaction submitted to the FVM network: {}...", hash),
        );

        contract
            .wait_for_receipt(&pending, self.config.poll_interval, self.config.confirmation_timeout)
            .await?;
        self.status.show_snackbar(SnackbarKind::Success, TX_INCLUDED);

        log::info!("Predicted job id {}", next_job_id);
        self.images.set_image_id(next_job_id);

        self.set_phase(JobPhase::GeneratingImages)?;
        self.status.update(|s| {
            s.is_loading = Some(GENERATING.into());
            s.is_message = true;
            s.message = StatusMessage::new(GENERATING_TITLE, EXPLORER_LINK_TEXT).with_link(link);
        });
        Ok(())
    }

    /// Poll the contract until the job is complete, cancelled, or `timeout`.
    ///
    /// Read errors are treated as transient and polling continues.
    async fn poll_completion(
        &self,
        contract: &WaterlilyContract<P>,
        job_id: u64,
        interval: Duration,
        timeout: Duration,
    ) -> JobResult<()> {
        let poll = async {
            loop {
                match contract.get_image(job_id).await {
                    Ok(image) if image.is_complete => return true,
                    Ok(image) if image.is_cancelled => return false,
                    Ok(_) => log::debug!("job {} still running", job_id),
                    Err(e) => log::warn!("Checking job {} failed: {}", job_id, e),
                }
                tokio::time::sleep(interval).await;
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(true) => {
                self.status.update(|s| {
                    s.is_loading = None;
                    s.is_message = true;
                    s.message = StatusMessage::new(JOB_SUCCEEDED, format!("Images: {}", job_id));
                });
                self.status.show_snackbar(SnackbarKind::Success, JOB_SUCCEEDED);
                self.set_phase(JobPhase::Complete)?;
                Ok(())
            }
            Ok(false) => {
                self.status.update(|s| {
                    s.is_loading = None;
                    s.is_error = ErrorFlag::Text(JOB_CANCELLED.into());
                    s.is_message = true;
                    s.message = StatusMessage::new(JOB_CANCELLED, JOB_CANCELLED_HELP);
                });
                self.status.show_snackbar(SnackbarKind::Error, JOB_CANCELLED);
                self.set_phase(JobPhase::Failed)?;
                Err(JobError::Cancelled)
            }
            Err(_) => {
                self.give_up(job_id)?;
                Err(JobError::Timeout(job_id))
            }
        }
    }

    /// Stop waiting for the images of the active job.
    ///
    /// Frees the submit control when the image side channel never reports.
    pub fn abandon(&self) -> JobResult<()> {
        if self.phase() != JobPhase::GeneratingImages {
            return Ok(());
        }
        self.give_up(self.images.image_id().unwrap_or_default())
    }

    fn give_up(&self, job_id: u64) -> JobResult<()> {
        self.set_phase(JobPhase::Failed)?;
        let text = JobError::Timeout(job_id).to_string();
        log::warn!("{}", text);
        self.status.update(|s| {
            s.is_loading = None;
            s.is_error = ErrorFlag::Text(text.clone());
            s.is_message = true;
            s.message = StatusMessage::new(text.clone(), JOB_CANCELLED_HELP);
        });
        self.status.show_snackbar(SnackbarKind::Error, text);
        Ok(())
    }

    /// Surface a failed step and classify it.
    fn fail(&self, err: &ContractError) -> JobError {
        log::error!("Job failed: {}", err);

        let reason = revert_reason(err);
        let is_transaction_failure = reason.is_some()
            || matches!(err, ContractError::Reverted(_) | ContractError::Rpc(RpcError::Rpc { .. }));
        let text = truncate_message(&reason.unwrap_or_else(|| err.to_string()));

        self.status.show_snackbar(SnackbarKind::Error, text.clone());
        self.status.update(|s| {
            s.is_loading = None;
            s.is_error = ErrorFlag::Flag(true);
            s.message = StatusMessage::new(text.clone(), text.clone());
        });
        if let Err(e) = self.set_phase(JobPhase::Failed) {
            log::warn!("{}", e);
        }

        if is_transaction_failure {
            JobError::TransactionFailure { reason: text }
        } else {
            JobError::UnknownFailure { message: text }
        }
    }

    /// Image side channel: called with the number of images seen for the
    /// active job. Returns `true` when this completed the job.
    pub fn on_images_observed(&self, count: usize) -> bool {
        if count < IMAGE_COUNT || self.phase() != JobPhase::GeneratingImages {
            return false;
        }
        if self.set_phase(JobPhase::Complete).is_err() {
            return false;
        }

        let tx_hash = self
            .current_submission()
            .and_then(|s| s.transaction_hash)
            .unwrap_or_default();
        let link = self.config.explorer_link(&tx_hash);

        self.status
            .show_snackbar(SnackbarKind::Success, IMAGES_GENERATED);
        self.status.update(|s| {
            s.is_loading = None;
            s.is_message = true;
            s.message = StatusMessage::new(format!("Receipt: {}", tx_hash), EXPLORER_LINK_TEXT)
                .with_link(link);
        });
        true
    }

    /// Poll the image host until all images of the active job exist.
    ///
    /// Returns `false` if the job left `GeneratingImages` some other way or
    /// `timeout` elapsed.
    pub async fn watch_images(&self, timeout: Duration) -> bool {
        let watch = async {
            while self.phase() == JobPhase::GeneratingImages {
                match self.images.refresh_quick_images().await {
                    Ok(count) => {
                        if self.on_images_observed(count) {
                            return true;
                        }
                    }
                    Err(e) => log::warn!("Image check failed: {}", e),
                }
                tokio::time::sleep(self.config.poll_interval).await;
            }
            false
        };
        tokio::time::timeout(timeout, watch).await.unwrap_or(false)
    }

    /// Load every image the connected account has paid for.
    ///
    /// Without a connected wallet there is nothing to load.
    pub async fn load_customer_images(&self) -> ContractResult<Vec<ImageRecord>> {
        let Ok(account) = self.wallet.primary_account() else {
            return Ok(Vec::new());
        };

        let contract = self.read_only()?;
        let ids = contract.get_customer_images(&account).await?;
        let images = try_join_all(ids.into_iter().map(|id| contract.get_image(id))).await?;

        *self
            .customer_images
            .write()
            .unwrap_or_else(PoisonError::into_inner) = images.clone();
        Ok(images)
    }

    /// `getImage(job_id)`, readable without a wallet.
    pub async fn image_record(&self, job_id: u64) -> ContractResult<ImageRecord> {
        self.read_only()?.get_image(job_id).await
    }

    fn read_only(&self) -> ContractResult<WaterlilyContract<P>> {
        let reader = self
            .reader
            .clone()
            .or_else(|| self.wallet.provider())
            .ok_or(ContractError::Unavailable)?;
        WaterlilyContract::read_only(reader, &self.config)
    }

    fn set_phase(&self, next: JobPhase) -> JobResult<()> {
        let mut phase = self.phase.write().unwrap_or_else(PoisonError::into_inner);
        *phase = phase.transition(next)?;
        log::debug!("job phase -> {}", next.name());
        Ok(())
    }

    fn remember(&self, submission: &JobSubmission) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(submission.clone());
    }
}
