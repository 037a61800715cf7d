//! Replication lag from `replSetGetStatus`.

use std::time::Duration;

use bson::{doc, DateTime, Document};
use serde::Deserialize;
use tracing::debug;

use mongowatch_adapters::{DatabaseHandle, MonitorError, ADMIN_DB};
use mongowatch_types::LagSample;

use crate::budget::Deadline;

/// Administrative command returning per-member replication state.
pub const STATUS_COMMAND: &str = "replSetGetStatus";

/// Role of a member as reported in `stateStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Primary,
    Secondary,
    Other,
}

impl MemberRole {
    fn from_state(state: &str) -> Self {
        match state {
            "PRIMARY" => MemberRole::Primary,
            "SECONDARY" => MemberRole::Secondary,
            _ => MemberRole::Other,
        }
    }
}

/// One member record of a status reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberStatus {
    pub name: String,
    pub state_str: String,
    /// Last applied operation; absent on arbiters and unreachable members.
    #[serde(default)]
    pub optime_date: Option<DateTime>,
}

impl MemberStatus {
    pub fn role(&self) -> MemberRole {
        MemberRole::from_state(&self.state_str)
    }
}

/// Decoded `replSetGetStatus` reply.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ReplicationStatus {
    #[serde(default)]
    pub members: Vec<MemberStatus>,
}

impl ReplicationStatus {
    /// Decode a raw reply. Malformed replies are command errors.
    pub fn from_document(reply: Document) -> Result<Self, MonitorError> {
        Ok(bson::from_document(reply)?)
    }

    /// Lag of every non-primary member, in the order the reply lists them.
    ///
    /// Fails with [`MonitorError::NoPrimary`] unless exactly one member
    /// reports the primary role.
    pub fn lag(&self) -> Result<Vec<LagSample>, MonitorError> {
        let primaries: Vec<&MemberStatus> = self
            .members
            .iter()
            .filter(|m| m.role() == MemberRole::Primary)
            .collect();

        let [primary] = primaries.as_slice() else {
            return Err(MonitorError::NoPrimary {
                primaries: primaries.len(),
            });
        };

        let primary_applied = primary.optime_date.ok_or_else(|| {
            MonitorError::Command(format!("primary {} reported no optimeDate", primary.name))
        })?;

        let samples = self
            .members
            .iter()
            .filter(|m| m.role() != MemberRole::Primary)
            .filter_map(|m| match m.optime_date {
                Some(applied) => Some(LagSample::new(
                    m.name.clone(),
                    primary_applied.timestamp_millis() - applied.timestamp_millis(),
                )),
                None => {
                    debug!(host = %m.name, state = %m.state_str, "Member has no optimeDate, skipping lag");
                    None
                }
            })
            .collect();

        Ok(samples)
    }
}

/// Computes per-secondary lag over an already-open seed connection.
#[derive(Debug, Clone)]
pub struct LagCalculator {
    timeout: Duration,
}

impl LagCalculator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Read replica-set status through `handle` and compute lag samples.
    pub async fn compute_lag<H: DatabaseHandle>(
        &self,
        handle: &H,
        deadline: &Deadline,
    ) -> Result<Vec<LagSample>, MonitorError> {
        let budget = deadline.child(self.timeout);
        let reply = budget
            .run(handle.run_command(ADMIN_DB, doc! { STATUS_COMMAND: 1 }))
            .await?;

        let samples = ReplicationStatus::from_document(reply)?.lag()?;

        for sample in &samples {
            debug!(host = %sample.host, "Replication lag {:.1}s", sample.as_secs_f64());
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{status_reply, FakeConnector, FakeNode};
    use mongowatch_adapters::DatabaseConnector;
    use mongowatch_adapters::ConnectMode;
    use mongowatch_types::Credentials;
    use tokio_util::sync::CancellationToken;

    const T: i64 = 1_700_000_000_000;

    fn status(members: &[(&str, &str, i64)]) -> ReplicationStatus {
        ReplicationStatus::from_document(status_reply(members)).unwrap()
    }

    #[test]
    fn lag_relative_to_primary() {
        let status = status(&[
            ("a:27017", "SECONDARY", T - 2_000),
            ("p:27017", "PRIMARY", T),
            ("b:27017", "SECONDARY", T + 1_000),
        ]);

        let samples = status.lag().unwrap();

        assert_eq!(
            samples,
            vec![
                LagSample::new("a:27017", 2_000),
                LagSample::new("b:27017", -1_000),
            ]
        );
        assert!(samples.iter().all(|s| s.host != "p:27017"));
    }

    #[test]
    fn no_primary_is_rejected() {
        let status = status(&[
            ("a:27017", "SECONDARY", T),
            ("b:27017", "RECOVERING", T),
        ]);

        let err = status.lag().unwrap_err();
        assert!(matches!(err, MonitorError::NoPrimary { primaries: 0 }));
    }

    #[test]
    fn two_primaries_are_rejected() {
        let status = status(&[
            ("a:27017", "PRIMARY", T),
            ("b:27017", "PRIMARY", T - 10),
            ("c:27017", "SECONDARY", T - 20),
        ]);

        let err = status.lag().unwrap_err();
        assert!(matches!(err, MonitorError::NoPrimary { primaries: 2 }));
    }

    #[test]
    fn empty_member_list_has_no_primary() {
        let status = ReplicationStatus::from_document(doc! { "ok": 1 }).unwrap();
        assert!(matches!(status.lag(), Err(MonitorError::NoPrimary { primaries: 0 })));
    }

    #[test]
    fn non_secondary_members_are_included() {
        let status = status(&[
            ("p:27017", "PRIMARY", T),
            ("r:27017", "RECOVERING", T - 60_000),
        ]);

        let samples = status.lag().unwrap();
        assert_eq!(samples, vec![LagSample::new("r:27017", 60_000)]);
        assert_eq!(MemberRole::from_state("RECOVERING"), MemberRole::Other);
    }

    #[test]
    fn members_without_optime_are_skipped() {
        let reply = doc! {
            "members": [
                { "name": "p:27017", "stateStr": "PRIMARY", "optimeDate": DateTime::from_millis(T) },
                { "name": "arb:27017", "stateStr": "ARBITER" },
                { "name": "s:27017", "stateStr": "SECONDARY", "optimeDate": DateTime::from_millis(T - 500) },
            ],
            "ok": 1,
        };

        let samples = ReplicationStatus::from_document(reply).unwrap().lag().unwrap();
        assert_eq!(samples, vec![LagSample::new("s:27017", 500)]);
    }

    #[test]
    fn primary_without_optime_is_a_command_error() {
        let reply = doc! {
            "members": [
                { "name": "p:27017", "stateStr": "PRIMARY" },
                { "name": "s:27017", "stateStr": "SECONDARY", "optimeDate": DateTime::from_millis(T) },
            ],
        };

        let err = ReplicationStatus::from_document(reply).unwrap().lag().unwrap_err();
        assert!(matches!(err, MonitorError::Command(_)));
    }

    #[test]
    fn malformed_reply_is_a_command_error() {
        let err = ReplicationStatus::from_document(doc! { "members": [ { "name": 7 } ] }).unwrap_err();
        assert!(matches!(err, MonitorError::Command(_)));
    }

    #[test]
    fn lag_is_idempotent() {
        let reply = status_reply(&[
            ("p:27017", "PRIMARY", T),
            ("a:27017", "SECONDARY", T - 1_234),
            ("b:27017", "SECONDARY", T - 5),
        ]);
        let status = ReplicationStatus::from_document(reply.clone()).unwrap();

        let first = status.lag().unwrap();
        let second = status.lag().unwrap();
        let fresh = ReplicationStatus::from_document(reply).unwrap().lag().unwrap();

        assert_eq!(first, second);
        assert_eq!(first, fresh);
    }

    #[tokio::test]
    async fn compute_lag_over_handle() {
        let connector = FakeConnector::new().with_node(
            "mongodb://seed",
            FakeNode::seed(
                &["p:27017", "s:27017"],
                status_reply(&[("p:27017", "PRIMARY", T), ("s:27017", "SECONDARY", T - 3_000)]),
            ),
        );
        let handle = connector
            .connect("mongodb://seed", ConnectMode::Discover, &Credentials::default(), Duration::from_secs(1))
            .await
            .unwrap();
        let deadline = Deadline::unbounded(CancellationToken::new());

        let samples = LagCalculator::new(Duration::from_secs(10))
            .compute_lag(&handle, &deadline)
            .await
            .unwrap();

        assert_eq!(samples, vec![LagSample::new("s:27017", 3_000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn compute_lag_times_out() {
        let connector = FakeConnector::new().with_node(
            "mongodb://seed",
            FakeNode::seed(&[], status_reply(&[])).hanging(),
        );
        let handle = connector
            .connect("mongodb://seed", ConnectMode::Discover, &Credentials::default(), Duration::from_secs(1))
            .await
            .unwrap();
        let deadline = Deadline::unbounded(CancellationToken::new());

        let err = LagCalculator::new(Duration::from_secs(10))
            .compute_lag(&handle, &deadline)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
    }
}
