//! # Quality-of-service profile.
//!
//! [`QoS`] carries the four policies the executor core cares about: history kind,
//! depth, durability and reliability. Everything else a middleware may negotiate is
//! out of scope.
//!
//! ## Compatibility
//! A publisher/subscription pair is **incompatible** (no data flows) when:
//! - the publisher is best-effort and the subscription requests reliable delivery;
//! - the publisher is volatile and the subscription requests transient-local durability.
//!
//! The intra-process path imposes stricter rules, see [`QoS::check_intra_process`].
//!
//! ## Example
//! ```rust
//! use events_executor::{Durability, QoS};
//!
//! let qos = QoS::keep_last(10).durability(Durability::TransientLocal);
//! assert_eq!(qos.depth, 10);
//! assert!(qos.check_intra_process(false).is_err());
//! ```

use std::fmt;

use crate::error::ExecutorError;

/// Sample retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum History {
    /// Keep at most `depth` samples.
    KeepLast,
    /// Keep every sample (bounded only by resources).
    KeepAll,
}

/// Whether late joiners receive previously published samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    Volatile,
    TransientLocal,
}

/// Delivery guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    Reliable,
    BestEffort,
}

/// Policy reported by incompatible-QoS events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosPolicyKind {
    Invalid,
    Durability,
    Reliability,
}

impl fmt::Display for QosPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QosPolicyKind::Invalid => "INVALID_QOS_POLICY",
            QosPolicyKind::Durability => "DURABILITY_QOS_POLICY",
            QosPolicyKind::Reliability => "RELIABILITY_QOS_POLICY",
        };
        f.write_str(name)
    }
}

/// QoS profile of a publisher or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QoS {
    pub history: History,
    /// Only meaningful with [`History::KeepLast`].
    pub depth: usize,
    pub durability: Durability,
    pub reliability: Reliability,
}

impl Default for QoS {
    /// Keep last 10, volatile, reliable.
    fn default() -> Self {
        Self::keep_last(10)
    }
}

impl QoS {
    /// Keep-last profile with the given depth, volatile and reliable.
    pub fn keep_last(depth: usize) -> Self {
        Self {
            history: History::KeepLast,
            depth,
            durability: Durability::Volatile,
            reliability: Reliability::Reliable,
        }
    }

    /// Keep-all profile, volatile and reliable.
    pub fn keep_all() -> Self {
        Self {
            history: History::KeepAll,
            depth: 0,
            durability: Durability::Volatile,
            reliability: Reliability::Reliable,
        }
    }

    #[must_use]
    pub fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    #[must_use]
    pub fn transient_local(self) -> Self {
        self.durability(Durability::TransientLocal)
    }

    #[must_use]
    pub fn reliability(mut self, reliability: Reliability) -> Self {
        self.reliability = reliability;
        self
    }

    #[must_use]
    pub fn best_effort(self) -> Self {
        self.reliability(Reliability::BestEffort)
    }

    /// Maximum number of samples a queue with this profile retains (`None` = unbounded).
    pub fn retention(&self) -> Option<usize> {
        match self.history {
            History::KeepLast => Some(self.depth.max(1)),
            History::KeepAll => None,
        }
    }

    /// Validates this profile for intra-process use.
    ///
    /// Publishers and subscriptions both refuse keep-all history and any durability
    /// other than volatile; subscriptions (`is_subscription = true`) additionally refuse
    /// keep-last with depth 0.
    pub fn check_intra_process(&self, is_subscription: bool) -> Result<(), ExecutorError> {
        if self.history == History::KeepAll {
            return Err(ExecutorError::invalid_argument(
                "intraprocess communication is not allowed with keep all history qos policy",
            ));
        }
        if is_subscription && self.depth == 0 {
            return Err(ExecutorError::invalid_argument(
                "intraprocess communication is not allowed with keep last history and 0 depth qos policy",
            ));
        }
        if self.durability != Durability::Volatile {
            return Err(ExecutorError::invalid_argument(
                "intraprocess communication allowed only with volatile durability",
            ));
        }
        Ok(())
    }
}

/// Checks whether data offered with `offered` may reach a reader requesting `requested`.
///
/// Returns the last incompatible policy, or `None` if the pair can communicate.
pub fn incompatible_policy(offered: &QoS, requested: &QoS) -> Option<QosPolicyKind> {
    let mut last = None;
    if offered.reliability == Reliability::BestEffort
        && requested.reliability == Reliability::Reliable
    {
        last = Some(QosPolicyKind::Reliability);
    }
    if offered.durability == Durability::Volatile
        && requested.durability == Durability::TransientLocal
    {
        last = Some(QosPolicyKind::Durability);
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intra_process_rejects_keep_all() {
        let err = QoS::keep_all().check_intra_process(false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "intraprocess communication is not allowed with keep all history qos policy"
        );
    }

    #[test]
    fn test_intra_process_rejects_zero_depth_for_subscriptions_only() {
        let qos = QoS::keep_last(0);
        assert!(qos.check_intra_process(false).is_ok());
        let err = qos.check_intra_process(true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "intraprocess communication is not allowed with keep last history and 0 depth qos policy"
        );
    }

    #[test]
    fn test_intra_process_requires_volatile() {
        let err = QoS::keep_last(5)
            .transient_local()
            .check_intra_process(true)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "intraprocess communication allowed only with volatile durability"
        );
    }

    #[test]
    fn test_incompatible_policy() {
        let volatile = QoS::keep_last(1);
        let transient = QoS::keep_last(1).transient_local();
        assert_eq!(
            incompatible_policy(&volatile, &transient),
            Some(QosPolicyKind::Durability)
        );
        assert_eq!(incompatible_policy(&transient, &volatile), None);

        let best_effort = QoS::keep_last(1).best_effort();
        assert_eq!(
            incompatible_policy(&best_effort, &volatile),
            Some(QosPolicyKind::Reliability)
        );
        assert_eq!(incompatible_policy(&volatile, &best_effort), None);
    }

    #[test]
    fn test_retention() {
        assert_eq!(QoS::keep_last(3).retention(), Some(3));
        assert_eq!(QoS::keep_last(0).retention(), Some(1));
        assert_eq!(QoS::keep_all().retention(), None);
    }
}
