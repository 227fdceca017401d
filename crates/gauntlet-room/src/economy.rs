//! Gold rewards, interest, and streak counters.

use crate::PlayerSlot;

const BASE_REWARD: u32 = 250;
const WIN_BONUS: u32 = 50;
const WIN_STREAK_STEP: u32 = 25;
const LOSS_STREAK_STEP: u32 = 20;
const GOLD_PER_HP_LOST: u32 = 20;
const STREAK_CAP: u32 = 150;
const INTEREST_STEP: u32 = 100;
const INTEREST_PER_STEP: u32 = 10;
const INTEREST_CAP: u32 = 100;

/// Gold for a win that brings the streak to `consecutive_wins`.
pub fn winner_reward(consecutive_wins: u32) -> u32 {
    let streak = consecutive_wins.saturating_sub(1).saturating_mul(WIN_STREAK_STEP);
    BASE_REWARD + WIN_BONUS + streak.min(STREAK_CAP)
}

/// Gold for a loss costing `hp_lost` that brings the streak to
/// `consecutive_losses`.
pub fn loser_reward(hp_lost: u32, consecutive_losses: u32) -> u32 {
    let streak = consecutive_losses
        .saturating_sub(1)
        .saturating_mul(LOSS_STREAK_STEP);
    BASE_REWARD
        .saturating_add(hp_lost.saturating_mul(GOLD_PER_HP_LOST))
        .saturating_add(streak.min(STREAK_CAP))
}

/// Interest on banked `gold`: 10 per full 100, capped at 100.
pub fn interest(gold: u32) -> u32 {
    ((gold / INTEREST_STEP) * INTEREST_PER_STEP).min(INTEREST_CAP)
}

/// Pays `reward` plus interest on the gold held before the payout.
fn pay(slot: &mut PlayerSlot, reward: u32) -> u32 {
    let total = reward.saturating_add(interest(slot.gold));
    slot.gold = slot.gold.saturating_add(total);
    total
}

/// Credits a win. Returns the gold paid, interest included.
pub fn record_win(slot: &mut PlayerSlot) -> u32 {
    slot.wins += 1;
    slot.consecutive_wins += 1;
    slot.consecutive_losses = 0;
    let reward = winner_reward(slot.consecutive_wins);
    pay(slot, reward)
}

/// Charges a loss of `hp_lost` and pays the consolation. Returns the gold
/// paid, interest included.
pub fn record_loss(slot: &mut PlayerSlot, hp_lost: u32) -> u32 {
    slot.losses += 1;
    slot.consecutive_losses += 1;
    slot.consecutive_wins = 0;
    slot.hp.lose(hp_lost);
    let reward = loser_reward(hp_lost, slot.consecutive_losses);
    pay(slot, reward)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Room;
    use gauntlet_protocol::{Phase, RoomId, RoomMode};
    use gauntlet_transport::ConnectionId;

    fn slot() -> PlayerSlot {
        let mut room = Room::new(RoomId(1), RoomMode::Duo, Phase::Lobby, 2);
        let seat = room.join(ConnectionId::new(1), "p".into(), 50, 0).unwrap();
        room.slot(seat).unwrap().clone()
    }

    #[test]
    fn test_winner_reward_grows_with_streak_and_caps() {
        assert_eq!(winner_reward(1), 300);
        assert_eq!(winner_reward(2), 325);
        assert_eq!(winner_reward(3), 350);
        assert_eq!(winner_reward(7), 450);
        assert_eq!(winner_reward(50), 450);
    }

    #[test]
    fn test_loser_reward_streak_bonus_caps_at_150() {
        assert_eq!(loser_reward(5, 1), 350);
        assert_eq!(loser_reward(0, 8), 250 + 140);
        assert_eq!(loser_reward(0, 9), 250 + 150);
        assert_eq!(loser_reward(0, 40), 250 + 150);
    }

    #[test]
    fn test_interest_ten_per_hundred_caps_at_100() {
        assert_eq!(interest(0), 0);
        assert_eq!(interest(99), 0);
        assert_eq!(interest(250), 20);
        assert_eq!(interest(999), 90);
        assert_eq!(interest(1000), 100);
        assert_eq!(interest(5000), 100);
    }

    #[test]
    fn test_record_win_three_in_a_row_adds_interest() {
        let mut s = slot();
        assert_eq!(record_win(&mut s), 300);
        assert_eq!(record_win(&mut s), 325 + 30);
        // 655 banked before the third payout.
        assert_eq!(record_win(&mut s), 350 + 60);
        assert_eq!(s.gold, 300 + 355 + 410);
        assert_eq!(s.wins, 3);
        assert_eq!(s.consecutive_wins, 3);
    }

    #[test]
    fn test_record_loss_interest_uses_gold_before_payout() {
        let mut s = slot();
        s.gold = 300;
        assert_eq!(record_loss(&mut s, 5), 350 + 30);
        assert_eq!(s.gold, 680);
    }

    #[test]
    fn test_record_loss_resets_win_streak_and_floors_hp() {
        let mut s = slot();
        record_win(&mut s);
        record_loss(&mut s, 80);

        assert_eq!(s.consecutive_wins, 0);
        assert_eq!(s.consecutive_losses, 1);
        assert_eq!(s.hp.current, 0);
        assert_eq!(s.losses, 1);

        record_win(&mut s);
        assert_eq!(s.consecutive_losses, 0);
    }
}
