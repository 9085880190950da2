//! Newline-delimited JSON event source.
//!
//! Drives the collector without a host platform: each line of the input is
//! one [`HostEvent`], e.g. captured from a device or written by hand.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use polaris_types::HostEvent;

use crate::events::EventSender;

/// Counters from a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Events handed to the collector.
    pub delivered: usize,
    /// Lines that could not be parsed.
    pub malformed: usize,
}

/// Read events from `reader` until EOF and deliver them to `sender`.
///
/// Blank lines are skipped. Malformed lines are logged and skipped. Stops
/// early if the collector is no longer receiving.
pub async fn replay<R>(reader: R, sender: &EventSender) -> std::io::Result<ReplayStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = ReplayStats::default();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: HostEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping malformed event on line {}: {}", line_no, e);
                stats.malformed += 1;
                continue;
            }
        };

        if !sender.send(event).await {
            debug!("Collector stopped, ending replay at line {}", line_no);
            break;
        }
        stats.delivered += 1;
    }

    info!(
        "Replay finished: {} event(s) delivered, {} malformed",
        stats.delivered, stats.malformed
    );
    Ok(stats)
}
