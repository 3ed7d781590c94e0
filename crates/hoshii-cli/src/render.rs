//! Plain-text rendering of the watchlist.

use std::io::Write;

use hoshii_api::traits::CatalogRecord;
use hoshii_runtime::{RefreshOutcome, WatchlistView};

/// Writes refresh outcomes to a terminal (or any writer).
pub struct TerminalView<W: Write> {
    out: W,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_outcome(&mut self, outcome: &RefreshOutcome) -> std::io::Result<()> {
        match outcome {
            RefreshOutcome::Empty => {
                writeln!(self.out, "Your watchlist is empty.")?;
                writeln!(self.out, "Add anime with `hoshii toggle <ID>`.")
            }
            RefreshOutcome::Populated { records, .. } => {
                for record in records {
                    writeln!(self.out, "{}", card_line(record))?;
                }
                Ok(())
            }
            RefreshOutcome::Failed(e) => {
                writeln!(self.out, "Could not load your watchlist: {e}")?;
                writeln!(self.out, "Run `hoshii show` again to retry.")
            }
        }
    }
}

impl<W: Write> WatchlistView for TerminalView<W> {
    fn show_loading(&mut self) {
        if let Err(e) = writeln!(self.out, "Loading watchlist...") {
            tracing::warn!(error = %e, "Failed to write to terminal");
        }
    }

    fn show(&mut self, outcome: &RefreshOutcome) {
        if let Err(e) = self.write_outcome(outcome).and_then(|_| self.out.flush()) {
            tracing::warn!(error = %e, "Failed to write to terminal");
        }
    }
}

/// One line per anime: `★ 8.5  Title  [TV • 12 eps]  (#id)`.
pub fn card_line(record: &CatalogRecord) -> String {
    let badge = record
        .score_label()
        .map(|s| format!("★ {s}"))
        .unwrap_or_default();
    let episodes = record
        .episodes
        .map(|n| format!(" • {n} eps"))
        .unwrap_or_default();
    format!(
        "{badge:<6}  {}  [{}{episodes}]  (#{})",
        record.title,
        record.format_label(),
        record.id
    )
}
