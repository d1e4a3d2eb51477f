use std::sync::Arc;

use tracing::{debug, info_span, warn, Instrument};

use crate::credentials::{Credential, CredentialResolver};
use crate::db::{rule_repo, Database};
use crate::ledger::{ClaimId, ClaimOutcome, DedupLedger, RunLedger, RunStatus, Trigger};
use crate::mailbox::MailboxClient;
use crate::render::{DocumentRenderer, RenderRequest};
use crate::rules::Rule;
use crate::sanitize;
use crate::storage::StorageUploader;

use super::config::EngineConfig;
use super::context::{RunContext, RunOutcome};
use super::error::{EngineError, RunError};
use super::observer::{RunEvent, RunObserver, TracingObserver};

/// Title used when a message has no subject.
const UNTITLED: &str = "(no subject)";

/// Executes rules against the mailbox and storage collaborators.
///
/// There is no transaction spanning mailbox, storage and ledgers. Ordering
/// carries correctness instead: the run record opens before any external
/// I/O and every message is claimed before it is fetched.
pub struct RuleRunner {
    db: Database,
    runs: RunLedger,
    dedup: DedupLedger,
    credentials: Arc<dyn CredentialResolver>,
    mailbox: Arc<dyn MailboxClient>,
    renderer: Arc<dyn DocumentRenderer>,
    uploader: Arc<dyn StorageUploader>,
    observer: Arc<dyn RunObserver>,
    config: EngineConfig,
}

impl RuleRunner {
    pub fn new(
        db: Database,
        credentials: Arc<dyn CredentialResolver>,
        mailbox: Arc<dyn MailboxClient>,
        renderer: Arc<dyn DocumentRenderer>,
        uploader: Arc<dyn StorageUploader>,
    ) -> Self {
        Self {
            runs: RunLedger::new(db.clone()),
            dedup: DedupLedger::new(db.clone()),
            db,
            credentials,
            mailbox,
            renderer,
            uploader,
            observer: Arc::new(TracingObserver),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn runs(&self) -> &RunLedger {
        &self.runs
    }

    pub fn dedup(&self) -> &DedupLedger {
        &self.dedup
    }

    /// Runs `rule_id` on behalf of `user_id`.
    ///
    /// `Err` means nothing was recorded: the rule is missing, belongs to
    /// someone else, or the run record could not be opened. Every other
    /// failure is finalized in the run ledger and reported in the outcome.
    pub async fn run(&self, rule_id: &str, user_id: &str, trigger: Trigger) -> Result<RunOutcome, EngineError> {
        let span = info_span!("rule_run",
            rule_id = %rule_id,
            user = %sanitize::hash_id(user_id),
            trigger = %trigger,
            run_id = tracing::field::Empty,
        );
        self.run_inner(rule_id, user_id, trigger).instrument(span).await
    }

    async fn run_inner(&self, rule_id: &str, user_id: &str, trigger: Trigger) -> Result<RunOutcome, EngineError> {
        let rule = {
            let _step = info_span!("load_rule").entered();
            rule_repo::find_by_id(&self.db, rule_id)?
                .ok_or_else(|| EngineError::NotFound(rule_id.to_string()))?
        };

        {
            let _step = info_span!("authorize").entered();
            if rule.user_id != user_id {
                warn!("Run refused: caller does not own rule");
                return Err(EngineError::Forbidden);
            }
        }

        let run_id = {
            let _step = info_span!("open_run").entered();
            self.runs.open(&rule.id, &rule.user_id, trigger)?
        };
        tracing::Span::current().record("run_id", tracing::field::display(&run_id));

        let mut ctx = RunContext::new(&rule.id, &rule.user_id, trigger, run_id);
        let result = self.execute(&rule, &mut ctx).await;
        self.finalize(ctx, result.err())
    }

    async fn execute(&self, rule: &Rule, ctx: &mut RunContext) -> Result<(), RunError> {
        let credential = self
            .credentials
            .resolve(&rule.user_id)
            .instrument(info_span!("resolve_credential"))
            .await
            .map_err(|e| RunError::from(&e))?;

        let query = rule.search_expression();
        let ids = self
            .mailbox
            .search(&credential, &query, self.config.max_results)
            .instrument(info_span!("search", max_results = self.config.max_results))
            .await
            .map_err(|e| RunError::search(&e))?;
        ctx.candidates = ids.len();
        debug!("Search returned {} candidate(s)", ids.len());

        if ids.is_empty() {
            return Ok(());
        }

        let folder = rule.destination().ok_or_else(RunError::destination_missing)?;

        for message_id in &ids {
            let span = info_span!("item", message = %sanitize::hash_id(message_id));
            self.process_item(rule, folder, &credential, message_id, ctx)
                .instrument(span)
                .await?;
        }
        Ok(())
    }

    async fn process_item(
        &self,
        rule: &Rule,
        folder: &str,
        credential: &Credential,
        message_id: &str,
        ctx: &mut RunContext,
    ) -> Result<(), RunError> {
        let claim = match self.dedup.claim(&rule.id, &rule.user_id, message_id) {
            Ok(ClaimOutcome::Claimed(claim)) => claim,
            Ok(ClaimOutcome::AlreadyClaimed) => {
                ctx.skipped += 1;
                self.observer.on_event(&RunEvent::ItemSkipped {
                    message_id: message_id.to_string(),
                });
                return Ok(());
            }
            Err(e) => return Err(RunError::claim(&e)),
        };
        self.observer.on_event(&RunEvent::ItemClaimed {
            message_id: message_id.to_string(),
        });

        let file_id = match self.save_message(folder, credential, message_id, ctx).await {
            Ok(file_id) => file_id,
            Err(err) => {
                if self.config.claim_policy.releases_on_failure() {
                    self.release(&claim, ctx);
                }
                return Err(err);
            }
        };

        if let Err(e) = self.dedup.record_storage_ref(&claim, &file_id) {
            self.best_effort_failed(ctx, "record_storage_ref", e.to_string());
        }

        self.observer.on_event(&RunEvent::ItemSaved {
            message_id: message_id.to_string(),
            file_id: file_id.clone(),
        });
        ctx.file_ids.push(file_id);
        ctx.processed += 1;
        ctx.saved += 1;
        Ok(())
    }

    /// Fetch, render and upload one claimed message.
    async fn save_message(
        &self,
        folder: &str,
        credential: &Credential,
        message_id: &str,
        ctx: &mut RunContext,
    ) -> Result<String, RunError> {
        let message = self
            .mailbox
            .fetch(credential, message_id)
            .await
            .map_err(|e| RunError::fetch(&e))?;
        ctx.processed_subjects.push(message.subject.clone());

        let title = match message.subject.trim() {
            "" => UNTITLED.to_string(),
            _ => message.subject.clone(),
        };
        let request = RenderRequest {
            title,
            metadata: vec![
                ("gmail_message_id".to_string(), message_id.to_string()),
                ("from".to_string(), message.from.clone()),
                ("to".to_string(), message.to.clone()),
                ("date".to_string(), message.date.clone()),
            ],
            body_text: message.body_text.clone(),
        };
        let bytes = self.renderer.render(&request).map_err(|e| RunError::render(&e))?;

        let filename = sanitize::pdf_filename(message_id, &message.subject);
        let uploaded = self
            .uploader
            .upload(credential, folder, &filename, bytes)
            .await
            .map_err(|e| RunError::upload(&e))?;
        Ok(uploaded.file_id)
    }

    fn release(&self, claim: &ClaimId, ctx: &mut RunContext) {
        match self.dedup.release(claim) {
            Ok(()) => debug!("Released claim {}", claim),
            Err(e) => self.best_effort_failed(ctx, "release_claim", e.to_string()),
        }
    }

    fn best_effort_failed(&self, ctx: &mut RunContext, operation: &'static str, error: String) {
        ctx.warnings.push(format!("{}: {}", operation, error));
        self.observer.on_event(&RunEvent::BestEffortFailed { operation, error });
    }

    fn finalize(&self, ctx: RunContext, error: Option<RunError>) -> Result<RunOutcome, EngineError> {
        let written = match &error {
            None => self.runs.finalize_success(
                &ctx.run_id,
                ctx.processed,
                ctx.saved,
                &ctx.summary(),
            )?,
            Some(err) => self.runs.finalize_error(
                &ctx.run_id,
                &err.message,
                err.code.as_deref(),
                Some(err.step.as_str()),
            )?,
        };
        if !written {
            warn!("Run {} was already finalized; keeping the first result", ctx.run_id);
        }

        let outcome = ctx.into_outcome(error);
        self.observer.on_event(&RunEvent::RunFinished {
            run_id: outcome.run_id.clone(),
            status: outcome.status,
            summary: outcome.summary.clone(),
        });
        if outcome.status == RunStatus::Error {
            warn!("Run failed: {}", outcome.error.as_ref().map(|e| e.to_string()).unwrap_or_default());
        }
        Ok(outcome)
    }
}
