//! Entity operation handles and the create-or-reuse engine.
//!
//! [`EntityOp`] pairs an [`EntityKind`] with the query parameters for one
//! logical operation and drives the idempotent protocol: fetch what already
//! exists by name, create only what is missing, and verify that every
//! requested name is present afterward. Under [`RunMode::DryRun`] creation is
//! simulated with deterministic `"<name>-<index>"` placeholder identifiers
//! and never reaches the transport.

use std::collections::HashSet;

use tracing::debug;

use crate::entity::{EntityDef, EntityKind};
use crate::error::{OpsError, Result};
use crate::record::Record;
use crate::transport::GamTransport;

/// Execution mode, threaded explicitly through every create path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    #[default]
    Live,
    /// Simulate creation: synthesize placeholder ids, never call submit.
    DryRun,
}

impl RunMode {
    pub fn is_dry_run(self) -> bool {
        matches!(self, RunMode::DryRun)
    }
}

/// Runtime handle for one kind of remote entity plus its query parameters.
///
/// Construction runs the kind's defaulting function over `params` and, for
/// kinds that create exactly one record matching their own parameters
/// (Advertiser, Order, TargetingKey), seeds the dry-run buffer so the handle
/// is inspectable under dry run before any call is made.
#[derive(Debug)]
pub struct EntityOp {
    kind: EntityKind,
    params: Record,
    create_dry_run: Vec<Record>,
}

impl EntityOp {
    pub fn new(kind: EntityKind, params: Record) -> Self {
        let def = kind.def();
        let params = match def.defaults {
            Some(shape) => shape(&params),
            None => params,
        };
        let create_dry_run = if def.seeds_dry_run {
            let name = params.name().unwrap_or_default();
            vec![Record::new().with("id", format!("{name}-0"))]
        } else {
            Vec::new()
        };
        Self {
            kind,
            params,
            create_dry_run,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Fully-populated construction parameters (after defaulting).
    pub fn params(&self) -> &Record {
        &self.params
    }

    /// The most recent simulated create batch. Overwritten, never merged.
    pub fn create_dry_run(&self) -> &[Record] {
        &self.create_dry_run
    }

    fn def(&self) -> &'static EntityDef {
        self.kind.def()
    }

    /// Lists matching records through the kind's query method, passing the
    /// op's params as the filter. When the kind declares `query_fields`,
    /// the filter is restricted to that allowlist before it goes anywhere;
    /// unlisted params never reach the transport. Remote errors propagate
    /// unchanged.
    pub async fn fetch(&self, transport: &dyn GamTransport) -> Result<Vec<Record>> {
        let def = self.def();
        let filter = match def.query_fields {
            Some(allowlist) => self.params.project(allowlist),
            None => self.params.clone(),
        };
        let records = transport
            .list(def.service, def.list_method, &filter, def.query_fields)
            .await?;
        debug!(kind = ?self.kind, count = records.len(), "fetched records");
        Ok(records)
    }

    /// Submits `records` through the kind's create method, or synthesizes
    /// placeholder ids under dry run without touching the transport.
    pub async fn create(
        &mut self,
        transport: &dyn GamTransport,
        mode: RunMode,
        records: Vec<Record>,
    ) -> Result<Vec<Record>> {
        let def = self.def();
        let Some(create_method) = def.create_method else {
            return Err(OpsError::ReadOnly { kind: self.kind });
        };
        if mode.is_dry_run() {
            let synthesized = synthesize_ids(records);
            debug!(kind = ?self.kind, count = synthesized.len(), "dry-run create");
            self.create_dry_run = synthesized.clone();
            return Ok(synthesized);
        }
        let created = transport
            .submit(def.service, create_method, &records, def.create_fields)
            .await?;
        debug!(kind = ?self.kind, requested = records.len(), created = created.len(), "created records");
        Ok(created)
    }

    /// Creates every record in `records`, then verifies each requested name
    /// came back. No pre-fetch, no diffing: every call attempts creation of
    /// every passed record.
    pub async fn create_checked(
        &mut self,
        transport: &dyn GamTransport,
        mode: RunMode,
        records: Vec<Record>,
    ) -> Result<Vec<Record>> {
        let wanted = record_names(&records);
        let results = self.create(transport, mode, records).await?;
        verify_names(&wanted, &results)?;
        Ok(results)
    }

    /// Idempotent create-or-reuse over a set of names.
    ///
    /// Fetches existing records unconditionally, builds a create payload for
    /// each name not already present (present names are reused as-is, never
    /// re-created), creates the missing ones, and verifies the union covers
    /// every requested name. Duplicate input names collapse to one logical
    /// entity; an empty `names` is a no-op beyond the fetch.
    pub async fn ensure(
        &mut self,
        transport: &dyn GamTransport,
        mode: RunMode,
        names: &[&str],
    ) -> Result<Vec<Record>> {
        let mut results = self.fetch(transport).await?;
        let existing: HashSet<String> = results
            .iter()
            .filter_map(|r| r.name().map(str::to_owned))
            .collect();
        let wanted = dedup_names(names.iter().map(|n| n.to_string()));
        let to_create: Vec<&str> = wanted
            .iter()
            .map(String::as_str)
            .filter(|n| !existing.contains(*n))
            .collect();
        if !to_create.is_empty() {
            let build = self.def().value_payload.unwrap_or(bare_name_payload);
            let payloads: Vec<Record> = to_create
                .iter()
                .map(|&name| build(&self.params, name))
                .collect();
            let created = self.create(transport, mode, payloads).await?;
            results.extend(created);
        }
        verify_names(&wanted, &results)?;
        Ok(results)
    }
}

/// Fallback payload builder for kinds without a table-supplied one.
fn bare_name_payload(_params: &Record, name: &str) -> Record {
    Record::new().with("name", name)
}

/// Placeholder ids for a simulated create: `"<name>-<index>"` in batch order,
/// index starting at 0. Deterministic for a given ordered input.
fn synthesize_ids(records: Vec<Record>) -> Vec<Record> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, rec)| {
            let name = rec.name().unwrap_or_default().to_owned();
            rec.with("id", format!("{name}-{index}"))
        })
        .collect()
}

/// Names carried by `records`, first occurrence order, duplicates collapsed.
fn record_names(records: &[Record]) -> Vec<String> {
    dedup_names(records.iter().filter_map(|r| r.name().map(str::to_owned)))
}

fn dedup_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names.into_iter().filter(|n| seen.insert(n.clone())).collect()
}

/// Fails with the exact list of requested names absent from `results`.
/// Set membership only: counts are not compared.
fn verify_names(wanted: &[String], results: &[Record]) -> Result<()> {
    let present: HashSet<&str> = results.iter().filter_map(Record::name).collect();
    let missing: Vec<String> = wanted
        .iter()
        .filter(|n| !present.contains(n.as_str()))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(OpsError::Verification { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Scripted in-memory transport. `list` returns the shared `store`;
    /// `submit` echoes inputs with server-style ids and appends them to the
    /// store, unless a forced reply is queued.
    #[derive(Default)]
    struct MockTransport {
        store: Mutex<Vec<Record>>,
        forced_submit: Mutex<Option<Vec<Record>>>,
        submits: Mutex<Vec<Vec<Record>>>,
        list_filters: Mutex<Vec<Record>>,
    }

    impl MockTransport {
        fn with_existing(records: Vec<Record>) -> Self {
            Self {
                store: Mutex::new(records),
                ..Self::default()
            }
        }

        fn force_submit_reply(&self, reply: Vec<Record>) {
            *self.forced_submit.lock().unwrap() = Some(reply);
        }

        fn list_calls(&self) -> usize {
            self.list_filters.lock().unwrap().len()
        }

        fn list_filters(&self) -> Vec<Record> {
            self.list_filters.lock().unwrap().clone()
        }

        fn submitted(&self) -> Vec<Vec<Record>> {
            self.submits.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GamTransport for MockTransport {
        async fn list(
            &self,
            _service: &str,
            _method: &str,
            filter: &Record,
            _fields: Option<&[&str]>,
        ) -> std::result::Result<Vec<Record>, TransportError> {
            self.list_filters.lock().unwrap().push(filter.clone());
            Ok(self.store.lock().unwrap().clone())
        }

        async fn submit(
            &self,
            _service: &str,
            _method: &str,
            records: &[Record],
            _fields: Option<&[&str]>,
        ) -> std::result::Result<Vec<Record>, TransportError> {
            self.submits.lock().unwrap().push(records.to_vec());
            if let Some(reply) = self.forced_submit.lock().unwrap().take() {
                return Ok(reply);
            }
            let created: Vec<Record> = records
                .iter()
                .enumerate()
                .map(|(i, rec)| rec.clone().with("id", format!("srv-{i}")))
                .collect();
            self.store.lock().unwrap().extend(created.clone());
            Ok(created)
        }
    }

    fn targeting_values_op() -> EntityOp {
        EntityOp::new(
            EntityKind::TargetingValues,
            Record::new().with("customTargetingKeyId", "123"),
        )
    }

    fn names_of(records: &[Record]) -> Vec<&str> {
        records.iter().filter_map(Record::name).collect()
    }

    #[tokio::test]
    async fn ensure_creates_only_missing_names() {
        let transport =
            MockTransport::with_existing(vec![Record::new().with("name", "US").with("id", "k1")]);
        let mut op = targeting_values_op();

        let results = op
            .ensure(&transport, RunMode::Live, &["US", "CA"])
            .await
            .unwrap();

        let submitted = transport.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].len(), 1);
        let payload = &submitted[0][0];
        assert_eq!(payload.name(), Some("CA"));
        assert_eq!(payload.get("displayName"), Some(&json!("CA")));
        assert_eq!(payload.get("matchType"), Some(&json!("EXACT")));
        assert_eq!(payload.get("customTargetingKeyId"), Some(&json!("123")));

        assert_eq!(names_of(&results), vec!["US", "CA"]);
    }

    #[tokio::test]
    async fn ensure_fails_when_remote_silently_drops_a_name() {
        let transport =
            MockTransport::with_existing(vec![Record::new().with("name", "US").with("id", "k1")]);
        transport.force_submit_reply(Vec::new());
        let mut op = targeting_values_op();

        let err = op
            .ensure(&transport, RunMode::Live, &["US", "CA"])
            .await
            .unwrap_err();

        assert_eq!(err.missing_names(), Some(&["CA".to_string()][..]));
    }

    #[tokio::test]
    async fn ensure_dry_run_synthesizes_ids_without_submitting() {
        let transport = MockTransport::default();
        let mut op = targeting_values_op();

        let results = op
            .ensure(&transport, RunMode::DryRun, &["US"])
            .await
            .unwrap();

        assert!(transport.submitted().is_empty());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name(), Some("US"));
        assert_eq!(results[0].id(), Some("US-0"));
        assert_eq!(op.create_dry_run(), &results[..]);
    }

    #[tokio::test]
    async fn ensure_twice_creates_nothing_the_second_time() {
        let transport = MockTransport::default();
        let mut op = targeting_values_op();

        let first = op
            .ensure(&transport, RunMode::Live, &["US", "CA"])
            .await
            .unwrap();
        let second = op
            .ensure(&transport, RunMode::Live, &["US", "CA"])
            .await
            .unwrap();

        assert_eq!(transport.submitted().len(), 1);
        let mut first_names: Vec<&str> = names_of(&first);
        let mut second_names: Vec<&str> = names_of(&second);
        first_names.sort_unstable();
        second_names.sort_unstable();
        assert_eq!(first_names, second_names);
    }

    #[tokio::test]
    async fn ensure_empty_names_is_a_noop() {
        let transport = MockTransport::default();
        let mut op = targeting_values_op();

        let results = op.ensure(&transport, RunMode::Live, &[]).await.unwrap();

        assert_eq!(transport.list_calls(), 1);
        assert!(transport.submitted().is_empty());
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn ensure_collapses_duplicate_input_names() {
        let transport = MockTransport::default();
        let mut op = targeting_values_op();

        op.ensure(&transport, RunMode::Live, &["US", "US"])
            .await
            .unwrap();

        let submitted = transport.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].len(), 1);
    }

    #[tokio::test]
    async fn create_checked_reports_exactly_the_dropped_names() {
        let transport = MockTransport::default();
        transport.force_submit_reply(vec![Record::new().with("name", "LI1").with("id", "x")]);
        let mut op = EntityOp::new(EntityKind::LineItem, Record::new());

        let err = op
            .create_checked(
                &transport,
                RunMode::Live,
                vec![
                    Record::new().with("name", "LI1"),
                    Record::new().with("name", "LI2"),
                ],
            )
            .await
            .unwrap_err();

        assert_eq!(err.missing_names(), Some(&["LI2".to_string()][..]));
        // record-batch style never pre-fetches
        assert_eq!(transport.list_calls(), 0);
    }

    #[tokio::test]
    async fn create_checked_passes_when_every_name_returns() {
        let transport = MockTransport::default();
        let mut op = EntityOp::new(EntityKind::LineItem, Record::new());

        let results = op
            .create_checked(
                &transport,
                RunMode::Live,
                vec![
                    Record::new().with("name", "LI1"),
                    Record::new().with("name", "LI2"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(names_of(&results), vec!["LI1", "LI2"]);
        assert!(results.iter().all(|r| r.id().is_some()));
    }

    #[tokio::test]
    async fn fetch_filter_is_restricted_to_query_fields() {
        let transport = MockTransport::default();
        let op = EntityOp::new(
            EntityKind::Creative,
            Record::new()
                .with("name", "c1")
                .with("advertiserId", "a1")
                .with("size", json!({"width": 300, "height": 250}))
                .with("snippet", "<div/>"),
        );

        op.fetch(&transport).await.unwrap();

        let filters = transport.list_filters();
        assert_eq!(filters.len(), 1);
        let filter = &filters[0];
        // width/height are derived from size at construction and allowlisted
        assert_eq!(filter.get("width"), Some(&json!(300)));
        assert_eq!(filter.get("height"), Some(&json!(250)));
        assert_eq!(filter.name(), Some("c1"));
        assert_eq!(filter.get("advertiserId"), Some(&json!("a1")));
        // unlisted params never reach the transport
        assert!(!filter.contains("size"));
        assert!(!filter.contains("snippet"));
    }

    #[tokio::test]
    async fn fetch_without_query_fields_sends_params_as_is() {
        let transport = MockTransport::default();
        let op = targeting_values_op();

        op.fetch(&transport).await.unwrap();

        let filters = transport.list_filters();
        assert_eq!(filters[0], *op.params());
    }

    #[tokio::test]
    async fn create_on_read_only_kind_is_an_error() {
        let transport = MockTransport::default();
        let mut op = EntityOp::new(EntityKind::AdUnit, Record::new());

        let err = op
            .create(&transport, RunMode::Live, vec![Record::new().with("name", "root")])
            .await
            .unwrap_err();

        assert!(matches!(err, OpsError::ReadOnly { kind: EntityKind::AdUnit }));
        assert!(transport.submitted().is_empty());
    }

    #[tokio::test]
    async fn dry_run_buffer_is_overwritten_not_merged() {
        let transport = MockTransport::default();
        let mut op = EntityOp::new(EntityKind::LineItem, Record::new());

        op.create(&transport, RunMode::DryRun, vec![Record::new().with("name", "a")])
            .await
            .unwrap();
        op.create(&transport, RunMode::DryRun, vec![Record::new().with("name", "b")])
            .await
            .unwrap();

        assert_eq!(op.create_dry_run().len(), 1);
        assert_eq!(op.create_dry_run()[0].id(), Some("b-0"));
    }

    #[test]
    fn synthesized_ids_are_positional_and_deterministic() {
        let batch = || {
            vec![
                Record::new().with("name", "a"),
                Record::new().with("name", "b"),
                Record::new().with("name", "c"),
            ]
        };
        let first = synthesize_ids(batch());
        let second = synthesize_ids(batch());
        let ids: Vec<&str> = first.iter().filter_map(Record::id).collect();
        assert_eq!(ids, vec!["a-0", "b-1", "c-2"]);
        assert_eq!(first, second);
    }

    #[test]
    fn advertiser_seeds_dry_run_buffer_at_construction() {
        let op = EntityOp::new(EntityKind::Advertiser, Record::new().with("name", "Acme"));
        assert_eq!(op.create_dry_run(), &[Record::new().with("id", "Acme-0")][..]);
        assert_eq!(op.params().get("type"), Some(&json!("ADVERTISER")));
    }

    #[test]
    fn order_and_targeting_key_seed_dry_run_buffers() {
        let order = EntityOp::new(EntityKind::Order, Record::new().with("name", "Q3 push"));
        assert_eq!(order.create_dry_run()[0].id(), Some("Q3 push-0"));

        let key = EntityOp::new(EntityKind::TargetingKey, Record::new().with("name", "hb_pb"));
        assert_eq!(key.create_dry_run()[0].id(), Some("hb_pb-0"));
        assert_eq!(key.params().get("displayName"), Some(&json!("hb_pb")));
    }

    #[test]
    fn verify_names_checks_set_membership_only() {
        let wanted = vec!["US".to_string(), "CA".to_string()];
        let results = vec![
            Record::new().with("name", "CA"),
            Record::new().with("name", "US"),
            Record::new().with("name", "US"),
        ];
        assert!(verify_names(&wanted, &results).is_ok());
        assert!(verify_names(&wanted, &results[..1]).is_err());
    }
}
