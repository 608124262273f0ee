//! Reconciliation between two alias collections
//!
//! [`SyncPlan::compute`] works out what a one-directional copy from a source
//! collection to a destination would do; [`SyncPlan::apply`] carries it out
//! against a destination [`StorageProvider`], asking for confirmation on
//! each action. Keys only present on the destination are never touched.
//!
//! [`audit`] is the read-only two-way report.

use tracing::{debug, info};

use crate::alias::{Alias, Aliases};
use crate::error::Result;
use crate::field::Field;
use crate::traits::StorageProvider;

/// Which differences a sync acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Copy aliases missing from the destination
    AddOnly,
    /// Copy missing aliases and overwrite differing ones
    AddAndUpdate,
}

/// One proposed change to the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Add(Alias),
    Update {
        /// Source record that will be written
        alias: Alias,
        /// Unified diff of source (expected) against destination (actual)
        diff: String,
    },
}

impl SyncAction {
    pub fn alias(&self) -> &Alias {
        match self {
            SyncAction::Add(alias) | SyncAction::Update { alias, .. } => alias,
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(self, SyncAction::Add(_))
    }

    /// Confirmation question for this action
    pub fn prompt(&self, destination: &str) -> String {
        match self {
            SyncAction::Add(a) => format!("Add alias for {} to {destination}?", a.key()),
            SyncAction::Update { alias, diff } => {
                format!("Update alias for {} in {destination}: {diff}?", alias.key())
            }
        }
    }
}

/// Yes/no gate in front of every sync action
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Confirms everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Outcome of applying a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Ordered list of actions taking a destination toward a source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub actions: Vec<SyncAction>,
}

impl SyncPlan {
    /// Plan the changes that copy `source` onto `destination`.
    ///
    /// Actions come out sorted by domain then alias.
    pub fn compute(source: &Aliases, destination: &Aliases, mode: SyncMode) -> Result<Self> {
        let source = source.to_map()?.to_slice();
        let destination = destination.to_map()?;

        let mut actions = Vec::new();
        for alias in source {
            match destination.get(&alias.alias, &alias.domain) {
                None => actions.push(SyncAction::Add(alias)),
                Some(current) if mode == SyncMode::AddAndUpdate && *current != alias => {
                    let diff = alias.unified_diff(current);
                    actions.push(SyncAction::Update { alias, diff });
                }
                Some(_) => {}
            }
        }

        Ok(Self { actions })
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Apply the plan to `destination`, one confirmed action at a time.
    ///
    /// Declined actions are skipped. The first backend error stops the run.
    pub async fn apply(
        &self,
        destination: &mut dyn StorageProvider,
        confirm: &mut dyn Confirm,
        update_modified: bool,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let name = destination.type_name();

        for action in &self.actions {
            if !confirm.confirm(&action.prompt(name))? {
                debug!(alias = %action.alias().key(), "sync action declined");
                report.skipped += 1;
                continue;
            }

            match action {
                SyncAction::Add(alias) => {
                    destination.put(alias.clone(), update_modified).await?;
                    report.added += 1;
                }
                SyncAction::Update { alias, .. } => {
                    destination.update(alias.clone(), update_modified).await?;
                    report.updated += 1;
                }
            }
            info!(alias = %action.alias().key(), destination = name, "synced alias");
        }

        Ok(report)
    }
}

/// Two-way difference between storage and the mail system
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Stored aliases missing or different in the mail system
    pub storage_only: Aliases,
    /// Mail system aliases missing or different in storage
    pub email_only: Aliases,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.storage_only.is_empty() && self.email_only.is_empty()
    }
}

/// Fields the mail system knows about
pub const AUDIT_FIELDS: [Field; 3] = [Field::Alias, Field::Domain, Field::EmailAddresses];

/// Compare stored aliases with the mail system's view.
///
/// Storage records are reduced to [`AUDIT_FIELDS`] first, since mail
/// providers carry no descriptions or timestamps.
pub fn audit(storage: &Aliases, email: &Aliases) -> Result<AuditReport> {
    let storage: Aliases = storage.iter().map(|a| a.strip(&AUDIT_FIELDS)).collect();
    let email: Aliases = email.iter().map(|a| a.strip(&AUDIT_FIELDS)).collect();

    Ok(AuditReport {
        storage_only: storage.diff(&email)?,
        email_only: email.diff(&storage)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::traits::MockStorageProvider;
    use mockall::predicate::*;

    fn alias(name: &str, domain: &str, description: &str) -> Alias {
        let mut a = Alias::new(name, domain);
        a.email_addresses = vec!["me@example.net".into()];
        a.description = description.into();
        a
    }

    /// Answers from a fixed script, recording the prompts
    struct Scripted {
        answers: Vec<bool>,
        prompts: Vec<String>,
    }

    impl Confirm for Scripted {
        fn confirm(&mut self, prompt: &str) -> Result<bool> {
            self.prompts.push(prompt.to_string());
            Ok(self.answers.remove(0))
        }
    }

    #[test]
    fn test_plan_add_and_update() {
        let source: Aliases = vec![alias("a", "x.com", "new"), alias("b", "x.com", "")].into();
        let destination: Aliases = vec![alias("a", "x.com", "old")].into();

        let plan = SyncPlan::compute(&source, &destination, SyncMode::AddAndUpdate).unwrap();
        assert_eq!(plan.len(), 2);

        match &plan.actions[0] {
            SyncAction::Update { alias, diff } => {
                assert_eq!(alias.key(), "a@x.com");
                assert!(!diff.is_empty());
                assert!(diff.contains("-Description: \"new\""));
                assert!(diff.contains("+Description: \"old\""));
            }
            other => panic!("expected update, got {other:?}"),
        }
        assert_eq!(plan.actions[1], SyncAction::Add(alias("b", "x.com", "")));
    }

    #[test]
    fn test_plan_never_touches_destination_only() {
        let source: Aliases = vec![alias("a", "x.com", "")].into();
        let destination: Aliases =
            vec![alias("a", "x.com", ""), alias("extra", "x.com", "")].into();

        let plan = SyncPlan::compute(&source, &destination, SyncMode::AddAndUpdate).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_add_only_ignores_differences() {
        let source: Aliases = vec![alias("a", "x.com", "new"), alias("b", "x.com", "")].into();
        let destination: Aliases = vec![alias("a", "x.com", "old")].into();

        let plan = SyncPlan::compute(&source, &destination, SyncMode::AddOnly).unwrap();
        assert_eq!(plan.actions, vec![SyncAction::Add(alias("b", "x.com", ""))]);
    }

    #[test]
    fn test_plan_rejects_duplicate_source_keys() {
        let source: Aliases = vec![alias("a", "x.com", "1"), alias("a", "x.com", "2")].into();
        let err = SyncPlan::compute(&source, &Aliases::new(), SyncMode::AddOnly).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
    }

    #[test]
    fn test_prompts() {
        let add = SyncAction::Add(alias("a", "x.com", ""));
        assert_eq!(add.prompt("sqlite3"), "Add alias for a@x.com to sqlite3?");
    }

    #[tokio::test]
    async fn test_apply_respects_confirmation() {
        let source: Aliases = vec![alias("a", "x.com", "new"), alias("b", "x.com", "")].into();
        let destination: Aliases = vec![alias("a", "x.com", "old")].into();
        let plan = SyncPlan::compute(&source, &destination, SyncMode::AddAndUpdate).unwrap();

        let mut store = MockStorageProvider::new();
        store.expect_type_name().return_const("files");
        store.expect_update().never();
        store
            .expect_put()
            .with(eq(alias("b", "x.com", "")), eq(false))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut confirm = Scripted {
            answers: vec![false, true],
            prompts: Vec::new(),
        };
        let report = plan.apply(&mut store, &mut confirm, false).await.unwrap();

        assert_eq!(
            report,
            SyncReport {
                added: 1,
                updated: 0,
                skipped: 1
            }
        );
        assert!(confirm.prompts[0].starts_with("Update alias for a@x.com in files:"));
        assert_eq!(confirm.prompts[1], "Add alias for b@x.com to files?");
    }

    #[tokio::test]
    async fn test_apply_assume_yes() {
        let source: Aliases = vec![alias("a", "x.com", "new"), alias("b", "x.com", "")].into();
        let destination: Aliases = vec![alias("a", "x.com", "old")].into();
        let plan = SyncPlan::compute(&source, &destination, SyncMode::AddAndUpdate).unwrap();

        let mut store = MockStorageProvider::new();
        store.expect_type_name().return_const("s3");
        store
            .expect_update()
            .with(eq(alias("a", "x.com", "new")), eq(true))
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_put().times(1).returning(|_, _| Ok(()));

        let report = plan.apply(&mut store, &mut AssumeYes, true).await.unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn test_apply_stops_on_error() {
        let plan = SyncPlan::compute(
            &vec![alias("a", "x.com", ""), alias("b", "x.com", "")].into(),
            &Aliases::new(),
            SyncMode::AddOnly,
        )
        .unwrap();

        let mut store = MockStorageProvider::new();
        store.expect_type_name().return_const("s3");
        store
            .expect_put()
            .times(1)
            .returning(|_, _| Err(Error::ReadOnly("S3".into())));

        let err = plan.apply(&mut store, &mut AssumeYes, false).await.unwrap_err();
        assert!(matches!(err, Error::ReadOnly(_)));
    }

    #[test]
    fn test_audit_both_directions() {
        let mut stored = alias("a", "x.com", "described");
        stored.created_ts = Some("2020-01-01T00:00:00Z".parse().unwrap());
        let storage: Aliases = vec![stored, alias("only-stored", "x.com", "")].into();

        let mut live_b = Alias::new("only-live", "x.com");
        live_b.email_addresses = vec!["me@example.net".into()];
        let mut live_a = Alias::new("a", "x.com");
        live_a.email_addresses = vec!["me@example.net".into()];
        let email: Aliases = vec![live_a, live_b].into();

        let report = audit(&storage, &email).unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.storage_only.len(), 1);
        assert_eq!(report.storage_only[0].alias, "only-stored");
        assert_eq!(report.storage_only[0].description, "");
        assert_eq!(report.email_only.len(), 1);
        assert_eq!(report.email_only[0].alias, "only-live");
    }
}
