//! Signal table: the entry/exit boolean series that drive the simulator.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::error::RuletraderError;
use crate::domain::frame::HistoricalFrame;

pub const ENTRY_CHANNEL: &str = "entry";
pub const EXIT_CHANNEL: &str = "exit";

#[derive(Debug, Clone, PartialEq)]
pub struct SignalTable {
    index: Vec<NaiveDate>,
    entry: Vec<bool>,
    exit: Vec<bool>,
}

impl SignalTable {
    pub fn new(
        index: Vec<NaiveDate>,
        entry: Vec<bool>,
        exit: Vec<bool>,
    ) -> Result<Self, RuletraderError> {
        for (name, channel) in [(ENTRY_CHANNEL, &entry), (EXIT_CHANNEL, &exit)] {
            if channel.len() != index.len() {
                return Err(RuletraderError::SignalValidation {
                    reason: format!(
                        "'{}' channel has {} values but the index has {} dates",
                        name,
                        channel.len(),
                        index.len()
                    ),
                });
            }
        }
        Ok(Self { index, entry, exit })
    }

    /// Build from named channels; `entry` and `exit` must both be present.
    /// Other channels are ignored.
    pub fn from_channels(
        index: Vec<NaiveDate>,
        mut channels: BTreeMap<String, Vec<bool>>,
    ) -> Result<Self, RuletraderError> {
        let mut take = |name: &str| {
            channels
                .remove(name)
                .ok_or_else(|| RuletraderError::SignalValidation {
                    reason: format!("missing required '{}' channel", name),
                })
        };
        let entry = take(ENTRY_CHANNEL)?;
        let exit = take(EXIT_CHANNEL)?;
        Self::new(index, entry, exit)
    }

    /// A table on which nothing ever fires.
    pub fn quiet(index: Vec<NaiveDate>) -> Self {
        let len = index.len();
        Self {
            index,
            entry: vec![false; len],
            exit: vec![false; len],
        }
    }

    /// The table must cover exactly the frame's dates, in order.
    pub fn validate_against(&self, frame: &HistoricalFrame) -> Result<(), RuletraderError> {
        if self.index.len() != frame.len() {
            return Err(RuletraderError::SignalValidation {
                reason: format!(
                    "signal index has {} dates but the frame has {}",
                    self.index.len(),
                    frame.len()
                ),
            });
        }
        if let Some((i, (ours, theirs))) = self
            .index
            .iter()
            .zip(frame.index())
            .enumerate()
            .find(|(_, (a, b))| a != b)
        {
            return Err(RuletraderError::SignalValidation {
                reason: format!(
                    "signal index is misaligned with the frame at row {}: {} vs {}",
                    i, ours, theirs
                ),
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn entry(&self) -> &[bool] {
        &self.entry
    }

    pub fn exit(&self) -> &[bool] {
        &self.exit
    }

    pub fn entry_count(&self) -> usize {
        self.entry.iter().filter(|&&b| b).count()
    }

    pub fn exit_count(&self) -> usize {
        self.exit.iter().filter(|&&b| b).count()
    }
}
