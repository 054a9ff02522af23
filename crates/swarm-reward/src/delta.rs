//! Reward and win deltas between consecutive polls.

use swarm_proto::format_amount;

/// Increase detected by one [`DeltaTracker::observe`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub reward: f64,
    pub reward_diff: Option<f64>,
    pub score: f64,
    pub win_diff: Option<f64>,
}

impl Delta {
    /// `🎁 reward 150+50 🏆 win 4+1`, listing only the metrics that grew.
    pub fn message(&self) -> String {
        let mut parts = Vec::with_capacity(2);
        if let Some(diff) = self.reward_diff {
            parts.push(format!(
                "🎁 reward {}+{}",
                format_amount(self.reward),
                format_amount(diff)
            ));
        }
        if let Some(diff) = self.win_diff {
            parts.push(format!(
                "🏆 win {}+{}",
                format_amount(self.score),
                format_amount(diff)
            ));
        }
        parts.join(" ")
    }
}

/// Last seen reward and win count, in memory only.
///
/// Both values are overwritten on every observation, including decreases, so
/// a drop followed by a rise is measured from the dropped value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaTracker {
    last_reward: Option<f64>,
    last_win: Option<f64>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_reward(&self) -> Option<f64> {
        self.last_reward
    }

    pub fn last_win(&self) -> Option<f64> {
        self.last_win
    }

    pub fn observe(&mut self, reward: f64, score: f64) -> Option<Delta> {
        let reward_diff = increase(self.last_reward, reward);
        let win_diff = increase(self.last_win, score);
        self.last_reward = Some(reward);
        self.last_win = Some(score);

        (reward_diff.is_some() || win_diff.is_some()).then_some(Delta {
            reward,
            reward_diff,
            score,
            win_diff,
        })
    }
}

fn increase(last: Option<f64>, current: f64) -> Option<f64> {
    last.filter(|prev| current > *prev).map(|prev| current - prev)
}
