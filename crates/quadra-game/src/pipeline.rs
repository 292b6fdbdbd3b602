//! Phase-aware validation and execution of in-game actions.
//!
//! Validation never mutates state. Execution validates first and only
//! touches the game once the action has fully passed; a rejected action
//! leaves the state bit-for-bit unchanged. Every rejection carries a
//! specific human-readable reason so the client can display why.

use quadra_protocol::Action;

use crate::state::{Board, GameState, Ruleset};
use crate::types::{
    ActionOutcome, ActionResult, CellKind, GamePhase, MysteryOutcome, SeatId, Token, TurnPhase,
    ValidationResult,
};

/// Checks whether `seat` may perform `action` right now.
pub fn validate_action<G, R>(
    state: &G,
    rules: &R,
    seat: SeatId,
    action: &Action,
) -> ValidationResult
where
    G: GameState,
    R: Ruleset<G>,
{
    if state.phase() != GamePhase::Playing {
        return ValidationResult::fail(format!(
            "game is not in progress (phase: {})",
            state.phase()
        ));
    }

    let current = state.current_turn();
    if seat != current {
        return ValidationResult::fail(format!(
            "not your turn: it is {}'s turn",
            seat_label(state, current)
        ));
    }

    match *action {
        Action::Move {
            token_id,
            destination,
        } => {
            if state.turn_phase() != TurnPhase::Movement {
                return ValidationResult::fail(format!(
                    "move is only allowed in the movement phase (current: {})",
                    state.turn_phase()
                ));
            }
            let token = match acting_token(state, seat, token_id) {
                Ok(token) => token,
                Err(verdict) => return verdict,
            };
            if !rules.legal_destinations(state, token).contains(&destination) {
                return ValidationResult::fail(format!(
                    "{destination} is not a legal destination for {token_id}"
                ));
            }
            ValidationResult::ok()
        }

        Action::Attack {
            attacker_id,
            defender_id,
        } => {
            if state.turn_phase() != TurnPhase::Action {
                return ValidationResult::fail(format!(
                    "attack is only allowed in the action phase (current: {})",
                    state.turn_phase()
                ));
            }
            let attacker = match acting_token(state, seat, attacker_id) {
                Ok(token) => token,
                Err(verdict) => return verdict,
            };
            let Some(defender) = state.token(defender_id) else {
                return ValidationResult::fail(format!("{defender_id} does not exist"));
            };
            if defender.owner == seat {
                return ValidationResult::fail(format!(
                    "cannot attack your own token {defender_id}"
                ));
            }
            if !defender.is_deployed() {
                return ValidationResult::fail(format!("{defender_id} is not on the board"));
            }
            if !defender.is_alive() {
                return ValidationResult::fail(format!(
                    "{defender_id} has already been destroyed"
                ));
            }
            if !rules.are_adjacent(attacker, defender) {
                return ValidationResult::fail(format!(
                    "{attacker_id} is not adjacent to {defender_id}"
                ));
            }
            ValidationResult::ok()
        }

        Action::Deploy { tier, destination } => {
            if state.turn_phase() != TurnPhase::Movement {
                return ValidationResult::fail(format!(
                    "deploy is only allowed in the movement phase (current: {})",
                    state.turn_phase()
                ));
            }
            if state.reserve_count(seat, tier) == 0 {
                return ValidationResult::fail(format!("no {tier} tokens left in reserve"));
            }
            if !state.board().is_valid_position(destination) {
                return ValidationResult::fail(format!("{destination} is outside the board"));
            }
            if state.board().occupant(destination).is_some() {
                return ValidationResult::fail(format!("{destination} is already occupied"));
            }
            if !rules
                .valid_deploy_cells(state.board(), seat)
                .contains(&destination)
            {
                return ValidationResult::fail(format!(
                    "{destination} is not in your deployment zone"
                ));
            }
            ValidationResult::ok()
        }

        // A player may pass without acting, in either phase.
        Action::EndTurn => ValidationResult::ok(),
    }
}

/// Validates and, if legal, applies `action` for `seat`.
pub fn execute_action<G, R>(
    state: &mut G,
    rules: &R,
    seat: SeatId,
    action: &Action,
) -> ActionResult
where
    G: GameState,
    R: Ruleset<G>,
{
    let verdict = validate_action(state, rules, seat, action);
    if !verdict.is_valid {
        tracing::debug!(seat = %seat, action = %action, reason = %verdict.message, "action rejected");
        return ActionResult::fail(verdict.message);
    }

    let result = match *action {
        Action::Move {
            token_id,
            destination,
        } => {
            let Some(from) = state.token(token_id).and_then(|t| t.position) else {
                return ActionResult::fail(format!("{token_id} is not on the board"));
            };
            if !state.move_token(token_id, destination) {
                return ActionResult::fail(format!(
                    "the board rejected moving {token_id} to {destination}"
                ));
            }

            let mystery = if state.board().cell_kind(destination) == Some(CellKind::Mystery) {
                let Some(token) = state.token(token_id).cloned() else {
                    return ActionResult::fail(format!("{token_id} vanished mid-move"));
                };
                let outcome = rules.trigger(state.board(), &token, seat);
                match outcome {
                    MysteryOutcome::Heal { new_health, .. } => {
                        state.set_token_health(token_id, new_health);
                    }
                    MysteryOutcome::Teleport { new_position } => {
                        // Occupancy bookkeeping for a teleport is ours,
                        // not the mystery resolver's.
                        state.board_mut().clear_occupant(destination);
                        state.set_token_position(token_id, new_position);
                        state.board_mut().set_occupant(new_position, token_id);
                    }
                }
                Some(outcome)
            } else {
                None
            };

            state.set_turn_phase(TurnPhase::Action);
            ActionResult::ok(
                format!("{token_id} moved to {destination}"),
                ActionOutcome::Moved {
                    token_id,
                    from,
                    to: destination,
                    mystery,
                },
            )
        }

        Action::Attack {
            attacker_id,
            defender_id,
        } => {
            let (Some(attacker), Some(defender)) = (
                state.token(attacker_id).cloned(),
                state.token(defender_id).cloned(),
            ) else {
                return ActionResult::fail("combatant vanished mid-attack".to_string());
            };

            let combat = rules.resolve(&attacker, &defender);
            if combat.killed {
                if let Some(pos) = defender.position {
                    state.board_mut().clear_occupant(pos);
                }
                state.remove_token(defender_id);
            } else {
                state.set_token_health(defender_id, combat.defender_health);
            }

            let message = if combat.killed {
                format!(
                    "{attacker_id} dealt {} damage and destroyed {defender_id}",
                    combat.damage
                )
            } else {
                format!("{attacker_id} dealt {} damage to {defender_id}", combat.damage)
            };
            ActionResult::ok(
                message,
                ActionOutcome::Attacked {
                    attacker_id,
                    defender_id,
                    combat,
                },
            )
        }

        Action::Deploy { tier, destination } => {
            let Some(token_id) = state.deploy_token(seat, tier, destination) else {
                return ActionResult::fail(format!("could not deploy {tier} at {destination}"));
            };
            state.set_turn_phase(TurnPhase::Action);
            ActionResult::ok(
                format!("{token_id} deployed at {destination}"),
                ActionOutcome::Deployed {
                    token_id,
                    seat,
                    tier,
                    position: destination,
                },
            )
        }

        Action::EndTurn => {
            let (next_seat, turn_number) = state.end_turn();
            ActionResult::ok(
                format!(
                    "turn passed to {} (turn {turn_number})",
                    seat_label(state, next_seat)
                ),
                ActionOutcome::TurnEnded {
                    next_seat,
                    turn_number,
                },
            )
        }
    };

    tracing::debug!(seat = %seat, action = %action, "action applied");
    result
}

/// The player's display name, or the seat itself when no name is known.
fn seat_label<G: GameState>(state: &G, seat: SeatId) -> String {
    state
        .player_name(seat)
        .unwrap_or_else(|| seat.to_string())
}

/// The acting player's own token, checked for existence, ownership,
/// deployment and life.
fn acting_token<G: GameState>(
    state: &G,
    seat: SeatId,
    id: quadra_protocol::TokenId,
) -> Result<&Token, ValidationResult> {
    let Some(token) = state.token(id) else {
        return Err(ValidationResult::fail(format!("{id} does not exist")));
    };
    if token.owner != seat {
        return Err(ValidationResult::fail(format!(
            "{id} does not belong to you"
        )));
    }
    if !token.is_deployed() {
        return Err(ValidationResult::fail(format!("{id} is not on the board")));
    }
    if !token.is_alive() {
        return Err(ValidationResult::fail(format!("{id} has been destroyed")));
    }
    Ok(token)
}

// =========================================================================
// Tests
// =========================================================================
