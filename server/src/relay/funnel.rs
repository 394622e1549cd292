use std::collections::HashSet;

use serde::Serialize;

/// Checkout funnel stages, in funnel order — matches the stage names the
/// storefront emits in `trackFunnelStep` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunnelStage {
    Cart = 0,
    Shipping = 1,
    Payment = 2,
    PixPending = 3,
    Completed = 4,
}

impl FunnelStage {
    pub const ALL: [FunnelStage; 5] = [
        Self::Cart,
        Self::Shipping,
        Self::Payment,
        Self::PixPending,
        Self::Completed,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "step1_cart" => Some(Self::Cart),
            "step2_shipping" => Some(Self::Shipping),
            "step3_payment" => Some(Self::Payment),
            "step4_pix_pending" => Some(Self::PixPending),
            "step5_completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cart => "step1_cart",
            Self::Shipping => "step2_shipping",
            Self::Payment => "step3_payment",
            Self::PixPending => "step4_pix_pending",
            Self::Completed => "step5_completed",
        }
    }
}

/// Per-stage counts in fixed funnel order — the `funnelUpdate` payload
/// pushed to the administrator room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FunnelSnapshot {
    pub step1_cart: usize,
    pub step2_shipping: usize,
    pub step3_payment: usize,
    pub step4_pix_pending: usize,
    pub step5_completed: usize,
}

impl FunnelSnapshot {
    /// Total number of currently tracked (non-untracked) users.
    pub fn total(&self) -> usize {
        self.step1_cart
            + self.step2_shipping
            + self.step3_payment
            + self.step4_pix_pending
            + self.step5_completed
    }
}

/// Funnel membership: one set of session tokens per stage.
///
/// Invariant: a token is a member of at most one stage set at any time.
/// Every mutation that inserts into a stage removes the token from all the
/// others first, in the same call.
#[derive(Default)]
pub struct FunnelTable {
    stages: [HashSet<String>; 5],
}

impl FunnelTable {
    /// Move `token` to `stage`, removing it from every other stage.
    pub fn track(&mut self, token: &str, stage: FunnelStage) {
        for (i, members) in self.stages.iter_mut().enumerate() {
            if i != stage as usize {
                members.remove(token);
            }
        }
        self.stages[stage as usize].insert(token.to_string());
    }

    /// Remove `token` from every stage. Returns whether membership actually
    /// changed, so disconnects of never-tracked connections don't trigger a
    /// redundant broadcast.
    pub fn remove(&mut self, token: &str) -> bool {
        let mut changed = false;
        for members in &mut self.stages {
            changed |= members.remove(token);
        }
        changed
    }

    pub fn contains(&self, stage: FunnelStage, token: &str) -> bool {
        self.stages[stage as usize].contains(token)
    }

    /// Move `token` from the pending stage to completed. Returns `false`
    /// (leaving all sets untouched) when it was not pending.
    pub fn complete_pending(&mut self, token: &str) -> bool {
        if !self.stages[FunnelStage::PixPending as usize].remove(token) {
            return false;
        }
        self.track(token, FunnelStage::Completed);
        true
    }

    /// Pure read of the current per-stage cardinalities.
    pub fn snapshot(&self) -> FunnelSnapshot {
        FunnelSnapshot {
            step1_cart: self.stages[FunnelStage::Cart as usize].len(),
            step2_shipping: self.stages[FunnelStage::Shipping as usize].len(),
            step3_payment: self.stages[FunnelStage::Payment as usize].len(),
            step4_pix_pending: self.stages[FunnelStage::PixPending as usize].len(),
            step5_completed: self.stages[FunnelStage::Completed as usize].len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_moves_token_between_stages() {
        let mut funnel = FunnelTable::default();
        funnel.track("u1", FunnelStage::Payment);
        funnel.track("u1", FunnelStage::PixPending);

        assert!(!funnel.contains(FunnelStage::Payment, "u1"));
        assert!(funnel.contains(FunnelStage::PixPending, "u1"));

        let snap = funnel.snapshot();
        assert_eq!(snap.step3_payment, 0);
        assert_eq!(snap.step4_pix_pending, 1);
        assert_eq!(snap.total(), 1);
    }

    #[test]
    fn token_never_occupies_two_stages() {
        let mut funnel = FunnelTable::default();
        for stage in FunnelStage::ALL {
            funnel.track("u1", stage);
            assert_eq!(funnel.snapshot().total(), 1);
        }
    }

    #[test]
    fn remove_reports_whether_membership_changed() {
        let mut funnel = FunnelTable::default();
        assert!(!funnel.remove("ghost"));

        funnel.track("u1", FunnelStage::Cart);
        assert!(funnel.remove("u1"));
        assert_eq!(funnel.snapshot().total(), 0);
    }

    #[test]
    fn complete_pending_only_moves_pending_tokens() {
        let mut funnel = FunnelTable::default();
        funnel.track("order-1", FunnelStage::Payment);
        assert!(!funnel.complete_pending("order-1"));
        assert!(funnel.contains(FunnelStage::Payment, "order-1"));

        funnel.track("order-1", FunnelStage::PixPending);
        assert!(funnel.complete_pending("order-1"));
        assert!(funnel.contains(FunnelStage::Completed, "order-1"));
        assert_eq!(funnel.snapshot().step4_pix_pending, 0);
        assert_eq!(funnel.snapshot().step5_completed, 1);
    }
}
