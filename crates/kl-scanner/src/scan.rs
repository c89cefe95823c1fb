//! Sequential query runner.
//!
//! Transactions never overlap on the bus. Between two of them the runner
//! waits `settle` so the ECUs can release the line; the same pause
//! precedes a retry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use kl_codec::{ByteChannel, KlineError, KlineResult, Outcome, execute};
use kl_protocol::{Address, DecodedRecord, Protocol, hex};

use crate::config::QueryConfig;

/// Pacing and retry policy of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPolicy {
    /// Per-read timeout handed to each transaction.
    pub timeout: Duration,
    /// Pause between transactions.
    pub settle: Duration,
    /// Extra attempts after a retryable failure.
    pub busy_retries: u32,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            timeout: kl_codec::transaction::DEFAULT_TIMEOUT,
            settle: Duration::from_millis(30),
            busy_retries: 0,
        }
    }
}

/// What one query produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryStatus {
    /// Reply decoded with a known layout.
    Decoded {
        #[serde(with = "kl_protocol::hex::bytes")]
        frame: Vec<u8>,
        record: DecodedRecord,
    },
    /// Valid reply the decoder could not turn into fields.
    Undecoded {
        #[serde(with = "kl_protocol::hex::bytes")]
        frame: Vec<u8>,
        error: String,
    },
    /// Nothing answered at the address.
    Unreachable,
    /// The exchange failed.
    Failed { error: String, retryable: bool },
}

/// Result of one configured query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryReport {
    /// When the first attempt started.
    pub timestamp: DateTime<Utc>,
    pub protocol: Protocol,
    pub address: Address,
    #[serde(with = "kl_protocol::hex::bytes")]
    pub command: Vec<u8>,
    /// Transactions run for this query, retries included.
    pub attempts: u32,
    #[serde(flatten)]
    pub status: QueryStatus,
}

impl QueryReport {
    pub fn record(&self) -> Option<&DecodedRecord> {
        match &self.status {
            QueryStatus::Decoded { record, .. } => Some(record),
            _ => None,
        }
    }
}

/// Run every query in order and report on each one.
///
/// A failing or unreachable query never ends the run early.
pub async fn run_queries(
    channel: &mut dyn ByteChannel,
    queries: &[QueryConfig],
    policy: &RunPolicy,
) -> Vec<QueryReport> {
    let mut reports = Vec::with_capacity(queries.len());
    for (index, query) in queries.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(policy.settle).await;
        }
        let report = run_query(&mut *channel, query, policy).await;
        log_report(&report);
        reports.push(report);
    }
    reports
}

/// Run one query, retrying retryable failures up to `policy.busy_retries` times.
pub async fn run_query(
    channel: &mut dyn ByteChannel,
    query: &QueryConfig,
    policy: &RunPolicy,
) -> QueryReport {
    let timestamp = Utc::now();
    let codec = query.codec();
    let request = query.request();

    let mut attempts = 0;
    let result: KlineResult<Outcome> = loop {
        attempts += 1;
        match execute(&*codec, &mut *channel, request.clone(), policy.timeout).await {
            Err(e) if e.is_retryable() && attempts <= policy.busy_retries => {
                tracing::debug!(
                    address = %query.address,
                    attempt = attempts,
                    error = %e,
                    "retrying query"
                );
                tokio::time::sleep(policy.settle).await;
            }
            other => break other,
        }
    };

    QueryReport {
        timestamp,
        protocol: query.protocol,
        address: query.address,
        command: query.command.clone(),
        attempts,
        status: status_of(result),
    }
}

fn status_of(result: KlineResult<Outcome>) -> QueryStatus {
    match result {
        Ok(Outcome::Reply(reply)) => match reply.decode() {
            Ok(record) => QueryStatus::Decoded {
                frame: reply.frame.into_bytes(),
                record,
            },
            Err(e) => QueryStatus::Undecoded {
                frame: reply.frame.into_bytes(),
                error: e.to_string(),
            },
        },
        Ok(Outcome::Unreachable { .. }) => QueryStatus::Unreachable,
        Err(e) => failed(&e),
    }
}

fn failed(error: &KlineError) -> QueryStatus {
    QueryStatus::Failed {
        error: error.to_string(),
        retryable: error.is_retryable(),
    }
}

fn log_report(report: &QueryReport) {
    let command = hex::spaced(&report.command);
    match &report.status {
        QueryStatus::Decoded { record, .. } => {
            tracing::info!(
                address = %report.address,
                command = %command,
                layout = %record.command,
                "query decoded"
            );
            for field in &record.fields {
                tracing::info!(address = %report.address, "{field}");
            }
            for fault in &record.faults {
                tracing::info!(address = %report.address, "fault {fault}");
            }
        }
        QueryStatus::Undecoded { frame, error } => {
            tracing::warn!(
                address = %report.address,
                command = %command,
                frame = %hex::spaced(frame),
                error = %error,
                "reply not decoded"
            );
        }
        QueryStatus::Unreachable => {
            tracing::info!(address = %report.address, command = %command, "no reply");
        }
        QueryStatus::Failed { error, .. } => {
            tracing::warn!(
                address = %report.address,
                command = %command,
                attempts = report.attempts,
                error = %error,
                "query failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kl_codec::{MockChannel, ds2};
    use kl_protocol::FieldValue;

    fn ds2_query(address: Address, command: &[u8]) -> QueryConfig {
        QueryConfig {
            protocol: Protocol::Ds2,
            address,
            source: Address::TESTER,
            command: command.to_vec(),
        }
    }

    fn policy(busy_retries: u32) -> RunPolicy {
        RunPolicy {
            busy_retries,
            ..RunPolicy::default()
        }
    }

    fn busy(address: Address) -> Vec<u8> {
        ds2::encode(address, &[0xA1]).unwrap()
    }

    fn gear_status() -> Vec<u8> {
        let mut payload = vec![0xA0];
        payload.extend_from_slice(&[0u8; 25]);
        payload[1] = 0x32; // 1600 rpm
        payload[21] = 0xC0; // first gear
        ds2::encode(Address::EGS, &payload).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn decodes_reply() {
        let mut mock = MockChannel::with_loopback();
        mock.queue(&gear_status());

        let reports = run_queries(
            &mut mock,
            &[ds2_query(Address::EGS, &[0x0B, 0x03])],
            &policy(0),
        )
        .await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].attempts, 1);
        let record = reports[0].record().unwrap();
        assert_eq!(record.command, "transmission_status");
        assert_eq!(
            record.value("transmission_rpm"),
            Some(&FieldValue::Number(1600.0))
        );
        assert_eq!(record.value("gear"), Some(&FieldValue::Text("1".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn busy_is_retried() {
        let mut mock = MockChannel::with_loopback();
        mock.queue(&busy(Address::EGS));
        let report = run_query(&mut mock, &ds2_query(Address::EGS, &[0x0B, 0x03]), &policy(2)).await;
        // The second attempt finds the bus silent.
        assert_eq!(report.attempts, 2);
        assert_eq!(report.status, QueryStatus::Unreachable);
        assert_eq!(mock.writes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_retries_exhausted() {
        let mut mock = MockChannel::with_loopback();
        mock.queue(&busy(Address::EGS));
        mock.queue(&busy(Address::EGS));

        let report = run_query(&mut mock, &ds2_query(Address::EGS, &[0x00]), &policy(1)).await;
        assert_eq!(report.attempts, 2);
        match report.status {
            QueryStatus::Failed { error, retryable } => {
                assert!(retryable);
                assert!(error.contains("computer busy"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn no_retries_by_default() {
        let mut mock = MockChannel::with_loopback();
        mock.queue(&busy(Address::EGS));

        let report = run_query(&mut mock, &ds2_query(Address::EGS, &[0x00]), &policy(0)).await;
        assert_eq!(report.attempts, 1);
        assert!(matches!(report.status, QueryStatus::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_is_not_retried() {
        let mut mock = MockChannel::with_loopback();
        mock.queue(&ds2::encode(Address::EGS, &[0xFF]).unwrap());

        let report = run_query(&mut mock, &ds2_query(Address::EGS, &[0x77]), &policy(3)).await;
        assert_eq!(report.attempts, 1);
        assert_eq!(
            report.status,
            QueryStatus::Failed {
                error: "ECU rejected request: invalid command".into(),
                retryable: false,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_command_keeps_frame() {
        let mut mock = MockChannel::with_loopback();
        let reply = ds2::encode(Address::EGS, &[0xA0, 0x01, 0x02]).unwrap();
        mock.queue(&reply);

        let report = run_query(&mut mock, &ds2_query(Address::EGS, &[0x77]), &policy(0)).await;
        match report.status {
            QueryStatus::Undecoded { frame, error } => {
                assert_eq!(frame, reply);
                assert!(error.contains("no payload layout"));
            }
            other => panic!("expected undecoded reply, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_continues_past_failures() {
        let mut mock = MockChannel::with_loopback();
        let queries = [
            ds2_query(Address::DME, &[0x00]),
            ds2_query(Address::EGS, &[0x0B, 0x03]),
        ];
        // The DME stays silent; only the EGS reply is queued behind the
        // second request.
        let first = run_query(&mut mock, &queries[0], &policy(0)).await;
        assert_eq!(first.status, QueryStatus::Unreachable);

        mock.queue(&gear_status());
        let reports = run_queries(&mut mock, &queries[1..], &policy(0)).await;
        assert!(reports[0].record().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn channel_failure_is_reported_and_run_goes_on() {
        let mut mock = MockChannel::with_loopback();
        mock.fail_next_write("adapter unplugged");
        let queries = [
            ds2_query(Address::DME, &[0x00]),
            ds2_query(Address::EGS, &[0x00]),
        ];

        let reports = run_queries(&mut mock, &queries, &policy(2)).await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].attempts, 1);
        assert!(matches!(
            &reports[0].status,
            QueryStatus::Failed { error, retryable: false } if error.contains("adapter unplugged")
        ));
        assert_eq!(reports[1].status, QueryStatus::Unreachable);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_delay_between_queries() {
        let mut mock = MockChannel::with_loopback();
        let queries = [
            ds2_query(Address::DME, &[0x00]),
            ds2_query(Address::EGS, &[0x00]),
            ds2_query(Address::IKE, &[0x00]),
        ];
        let policy = RunPolicy {
            settle: Duration::from_millis(100),
            ..RunPolicy::default()
        };

        let start = tokio::time::Instant::now();
        run_queries(&mut mock, &queries, &policy).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn report_serializes_flat() {
        let mut mock = MockChannel::with_loopback();
        let report = run_query(&mut mock, &ds2_query(Address::EGS, &[0x0B, 0x03]), &policy(0)).await;

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "unreachable");
        assert_eq!(json["address"], 0x32);
        assert_eq!(json["protocol"], "ds2");
        assert_eq!(json["command"], "0b03");
        assert!(json["timestamp"].is_string());
    }
}
