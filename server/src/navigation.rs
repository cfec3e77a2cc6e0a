//! Helm control: turns a plotted course into align, warp and realign
//! phases, or steady impulse motion inside the current quadrant.

use crate::constants::{
    ALIGN_TICKS, BLACK_HOLE_INTERLOCK_RADIUS, IMPULSE_ENERGY_PER_TICK, MAX_IMPULSE_PER_TICK,
    MIN_WARP_TICKS, QUADRANT_SIZE, REALIGN_TICKS, STAR_COLLISION_RADIUS, STAR_INTERLOCK_RADIUS,
    WARP_TICKS_PER_QUADRANT,
};
use crate::galaxy::Galaxy;
use crate::physics::{clamp_galactic, direction, from_galactic, heading_mark, to_galactic, Vector3};
use crate::ship::ShipState;

/// Per-captain helm state. Each mode carries only what it needs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum NavState {
    #[default]
    Idle,
    /// Rotating onto the new course before going to warp.
    Align {
        timer: u32,
        start_heading: f64,
        start_mark: f64,
        target_heading: f64,
        target_mark: f64,
        direction: Vector3,
        /// Galactic destination.
        target: Vector3,
    },
    Warp {
        timer: u32,
        step: f64,
        direction: Vector3,
        target: Vector3,
    },
    /// Levelling the mark back to zero after dropping out of warp.
    Realign { timer: u32, start_mark: f64 },
    Impulse { velocity: Vector3 },
}

impl NavState {
    pub fn is_idle(&self) -> bool {
        matches!(self, NavState::Idle)
    }
}

/// Something the helm reports to the captain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavEvent {
    EnteringWarp,
    ExitingWarp,
    Stabilized,
    StarInterlock,
    BlackHoleInterlock,
    GalacticBarrier,
    QuadrantBoundary,
    ImpulseCollision,
    ImpulseNoEnergy,
}

impl NavEvent {
    pub fn station(self) -> &'static str {
        match self {
            NavEvent::ImpulseNoEnergy => "ENGINEERING",
            NavEvent::StarInterlock | NavEvent::BlackHoleInterlock | NavEvent::ImpulseCollision => {
                "COMPUTER"
            }
            _ => "HELMSMAN",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            NavEvent::EnteringWarp => "Entering Warp drive.",
            NavEvent::ExitingWarp => "Exiting Warp. Realigning ship.",
            NavEvent::Stabilized => "Stabilized at sub-light speed.",
            NavEvent::StarInterlock => {
                "SAFETY INTERLOCK: Stellar mass on course. Emergency drop from warp."
            }
            NavEvent::BlackHoleInterlock => {
                "SAFETY INTERLOCK: Gravitational shear ahead. Emergency drop from warp."
            }
            NavEvent::GalacticBarrier => "Galactic barrier reached. Dropping out of warp.",
            NavEvent::QuadrantBoundary => "Impulse halted at quadrant boundary. Use warp to leave.",
            NavEvent::ImpulseCollision => "Collision alert: impulse halted near stellar body.",
            NavEvent::ImpulseNoEnergy => "Insufficient energy for impulse. Engines stopped.",
        }
    }
}

/// Plots a warp course of `warp` quadrant-widths along heading and mark.
pub fn plot_course(ship: &ShipState, heading: f64, mark: f64, warp: f64) -> NavState {
    let dir = direction(heading, mark);
    let target = ship.galactic().add(&dir.scale(warp * QUADRANT_SIZE));
    NavState::Align {
        timer: ALIGN_TICKS,
        start_heading: ship.heading,
        start_mark: ship.mark,
        target_heading: heading,
        target_mark: mark,
        direction: dir,
        target,
    }
}

/// Plots a warp course that stops `stop_distance` short of a galactic point.
/// Returns `None` when the ship is already that close.
pub fn plot_approach(ship: &ShipState, destination: Vector3, stop_distance: f64) -> Option<NavState> {
    let origin = ship.galactic();
    let delta = destination.sub(&origin);
    let distance = delta.magnitude();
    if distance <= stop_distance {
        return None;
    }

    let dir = delta.normalize();
    let (heading, mark) = heading_mark(delta);
    Some(NavState::Align {
        timer: ALIGN_TICKS,
        start_heading: ship.heading,
        start_mark: ship.mark,
        target_heading: heading,
        target_mark: mark,
        direction: dir,
        target: origin.add(&dir.scale(distance - stop_distance)),
    })
}

/// Engages impulse engines. The ship turns instantly; a speed of zero stops it.
pub fn engage_impulse(ship: &mut ShipState, heading: f64, mark: f64, speed: f64) -> NavState {
    ship.heading = heading;
    ship.mark = mark;
    if speed <= 0.0 {
        return NavState::Idle;
    }
    let velocity = direction(heading, mark).scale(speed.min(1.0) * MAX_IMPULSE_PER_TICK);
    NavState::Impulse { velocity }
}

/// Number of warp ticks needed to cover `distance` units.
pub fn warp_ticks(distance: f64) -> u32 {
    ((distance / QUADRANT_SIZE * WARP_TICKS_PER_QUADRANT) as u32).max(MIN_WARP_TICKS)
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

/// Checks whether the next warp step would carry the ship onto a star or
/// into a black hole's shear zone while still closing on it.
fn interlock(galaxy: &Galaxy, position: Vector3, travel: Vector3) -> Option<NavEvent> {
    let (quadrant, _) = from_galactic(position);

    let closing = |body: Vector3, radius: f64| {
        let offset = to_galactic(quadrant, body).sub(&position);
        offset.magnitude() < radius && offset.dot(&travel) > 0.0
    };

    if galaxy
        .stars_in(quadrant)
        .any(|(_, s)| closing(s.position, STAR_INTERLOCK_RADIUS))
    {
        return Some(NavEvent::StarInterlock);
    }
    if galaxy
        .black_holes_in(quadrant)
        .any(|(_, b)| closing(b.position, BLACK_HOLE_INTERLOCK_RADIUS))
    {
        return Some(NavEvent::BlackHoleInterlock);
    }
    None
}

fn realign(ship: &ShipState) -> NavState {
    NavState::Realign {
        timer: REALIGN_TICKS,
        start_mark: ship.mark,
    }
}

fn place(ship: &mut ShipState, galactic: Vector3) {
    let (quadrant, sector) = from_galactic(galactic);
    ship.quadrant = quadrant;
    ship.sector = sector;
}

/// Advances the helm by one tick.
pub fn advance(nav: &mut NavState, ship: &mut ShipState, galaxy: &Galaxy) -> Option<NavEvent> {
    match *nav {
        NavState::Idle => None,

        NavState::Align {
            timer,
            start_heading,
            start_mark,
            target_heading,
            target_mark,
            direction,
            target,
        } => {
            let timer = timer.saturating_sub(1);
            let t = 1.0 - timer as f64 / ALIGN_TICKS as f64;
            ship.heading = lerp(start_heading, target_heading, t);
            ship.mark = lerp(start_mark, target_mark, t);

            if timer > 0 {
                *nav = NavState::Align {
                    timer,
                    start_heading,
                    start_mark,
                    target_heading,
                    target_mark,
                    direction,
                    target,
                };
                return None;
            }

            let distance = target.distance(&ship.galactic());
            let ticks = warp_ticks(distance);
            *nav = NavState::Warp {
                timer: ticks,
                step: distance / ticks as f64,
                direction,
                target,
            };
            Some(NavEvent::EnteringWarp)
        }

        NavState::Warp {
            timer,
            step,
            direction,
            target,
        } => {
            let here = ship.galactic();
            let travel = direction.scale(step);
            let next = here.add(&travel);

            if let Some(event) = interlock(galaxy, next, travel) {
                *nav = realign(ship);
                return Some(event);
            }

            let timer = timer.saturating_sub(1);
            let (bounded, clamped) = if timer == 0 {
                clamp_galactic(target)
            } else {
                clamp_galactic(next)
            };
            place(ship, bounded);

            if clamped {
                *nav = realign(ship);
                Some(NavEvent::GalacticBarrier)
            } else if timer == 0 {
                *nav = realign(ship);
                Some(NavEvent::ExitingWarp)
            } else {
                *nav = NavState::Warp {
                    timer,
                    step,
                    direction,
                    target,
                };
                None
            }
        }

        NavState::Realign { timer, start_mark } => {
            let timer = timer.saturating_sub(1);
            let t = 1.0 - timer as f64 / REALIGN_TICKS as f64;
            ship.mark = start_mark * (1.0 - t);

            if timer > 0 {
                *nav = NavState::Realign { timer, start_mark };
                None
            } else {
                ship.mark = 0.0;
                *nav = NavState::Idle;
                Some(NavEvent::Stabilized)
            }
        }

        NavState::Impulse { velocity } => {
            if ship.energy < IMPULSE_ENERGY_PER_TICK {
                *nav = NavState::Idle;
                return Some(NavEvent::ImpulseNoEnergy);
            }

            let next = ship.sector.add(&velocity);
            let inside = |v: f64| (0.0..QUADRANT_SIZE).contains(&v);
            if !(inside(next.x) && inside(next.y) && inside(next.z)) {
                *nav = NavState::Idle;
                return Some(NavEvent::QuadrantBoundary);
            }

            if galaxy
                .stars_in(ship.quadrant)
                .any(|(_, s)| s.position.distance(&next) < STAR_COLLISION_RADIUS)
            {
                *nav = NavState::Idle;
                return Some(NavEvent::ImpulseCollision);
            }

            ship.sector = next;
            ship.energy -= IMPULSE_ENERGY_PER_TICK;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galaxy::{BlackHole, Star};
    use crate::physics::Quadrant;
    use assert_approx_eq::assert_approx_eq;

    fn run_until_idle(nav: &mut NavState, ship: &mut ShipState, galaxy: &Galaxy) -> (u32, Vec<NavEvent>) {
        let mut ticks = 0;
        let mut events = Vec::new();
        while !nav.is_idle() && ticks < 10_000 {
            if let Some(e) = advance(nav, ship, galaxy) {
                events.push(e);
            }
            ticks += 1;
        }
        (ticks, events)
    }

    #[test]
    fn test_warp_duration_and_destination() {
        let galaxy = Galaxy::default();
        let mut ship = ShipState::new(Quadrant::new(5, 5, 5));
        let mut nav = plot_course(&ship, 90.0, 0.0, 2.0);

        let mut warp_ticks_seen = 0;
        let mut events = Vec::new();
        while !matches!(nav, NavState::Realign { .. }) {
            if matches!(nav, NavState::Warp { .. }) {
                warp_ticks_seen += 1;
            }
            if let Some(e) = advance(&mut nav, &mut ship, &galaxy) {
                events.push(e);
            }
        }

        // 20 units at three seconds per 10 units is 180 ticks at 30 Hz
        assert_eq!(warp_ticks_seen, 180);
        assert_eq!(events, vec![NavEvent::EnteringWarp, NavEvent::ExitingWarp]);
        assert_eq!(ship.quadrant, Quadrant::new(7, 5, 5));
        assert_approx_eq!(ship.sector.x, 5.0, 1e-6);
        assert_approx_eq!(ship.sector.y, 5.0, 1e-6);
        assert_approx_eq!(ship.heading, 90.0, 1e-9);
    }

    #[test]
    fn test_short_warp_has_minimum_duration() {
        assert_eq!(warp_ticks(0.5), MIN_WARP_TICKS);
        assert_eq!(warp_ticks(10.0), 90);
    }

    #[test]
    fn test_realign_levels_mark() {
        let galaxy = Galaxy::default();
        let mut ship = ShipState::new(Quadrant::new(5, 5, 5));
        let mut nav = plot_course(&ship, 0.0, 30.0, 0.5);

        let (_, events) = run_until_idle(&mut nav, &mut ship, &galaxy);
        assert_eq!(events.last(), Some(&NavEvent::Stabilized));
        assert_eq!(ship.mark, 0.0);
        assert_approx_eq!(ship.heading, 0.0, 1e-9);
    }

    #[test]
    fn test_galactic_boundary_clamps() {
        let galaxy = Galaxy::default();
        let mut ship = ShipState::new(Quadrant::new(10, 5, 5));
        ship.sector = Vector3::new(9.99, 5.0, 5.0);
        let mut nav = plot_course(&ship, 90.0, 0.0, 3.0);

        let (_, events) = run_until_idle(&mut nav, &mut ship, &galaxy);
        assert!(events.contains(&NavEvent::GalacticBarrier));
        assert_eq!(ship.quadrant.x, 10);
        assert!(ship.sector.x < 10.0);
        assert!(ship.galactic().x <= 100.0);
    }

    #[test]
    fn test_star_interlock_drops_out_of_warp() {
        let mut galaxy = Galaxy::default();
        galaxy.stars.push(Star {
            quadrant: Quadrant::new(6, 5, 5),
            position: Vector3::new(5.0, 5.0, 5.0),
            active: true,
        });

        let mut ship = ShipState::new(Quadrant::new(5, 5, 5));
        let mut nav = plot_course(&ship, 90.0, 0.0, 2.0);
        let (_, events) = run_until_idle(&mut nav, &mut ship, &galaxy);

        assert!(events.contains(&NavEvent::StarInterlock));
        let star = to_galactic(Quadrant::new(6, 5, 5), Vector3::new(5.0, 5.0, 5.0));
        assert!(ship.galactic().distance(&star) >= STAR_INTERLOCK_RADIUS - 0.2);
        assert!(ship.galactic().x < star.x);
    }

    #[test]
    fn test_black_hole_behind_does_not_trip_interlock() {
        let mut galaxy = Galaxy::default();
        galaxy.black_holes.push(BlackHole {
            quadrant: Quadrant::new(5, 5, 5),
            position: Vector3::new(4.0, 5.0, 5.0),
            active: true,
        });

        let mut ship = ShipState::new(Quadrant::new(5, 5, 5));
        let mut nav = plot_course(&ship, 90.0, 0.0, 1.0);
        let (_, events) = run_until_idle(&mut nav, &mut ship, &galaxy);

        assert!(!events.contains(&NavEvent::BlackHoleInterlock));
        assert_eq!(ship.quadrant, Quadrant::new(6, 5, 5));
    }

    #[test]
    fn test_impulse_moves_and_costs_energy() {
        let galaxy = Galaxy::default();
        let mut ship = ShipState::new(Quadrant::new(5, 5, 5));
        let mut nav = engage_impulse(&mut ship, 90.0, 0.0, 0.5);

        for _ in 0..10 {
            assert_eq!(advance(&mut nav, &mut ship, &galaxy), None);
        }
        assert_approx_eq!(ship.sector.x, 5.5, 1e-9);
        assert_eq!(ship.energy, 2990);
        assert_eq!(ship.heading, 90.0);
    }

    #[test]
    fn test_impulse_stops_at_quadrant_edge() {
        let galaxy = Galaxy::default();
        let mut ship = ShipState::new(Quadrant::new(5, 5, 5));
        ship.sector = Vector3::new(9.95, 5.0, 5.0);
        let mut nav = engage_impulse(&mut ship, 90.0, 0.0, 1.0);

        assert_eq!(
            advance(&mut nav, &mut ship, &galaxy),
            Some(NavEvent::QuadrantBoundary)
        );
        assert!(nav.is_idle());
        assert_approx_eq!(ship.sector.x, 9.95, 1e-9);
        assert_eq!(ship.quadrant, Quadrant::new(5, 5, 5));
    }

    #[test]
    fn test_impulse_zero_speed_stops() {
        let mut ship = ShipState::new(Quadrant::new(5, 5, 5));
        let nav = engage_impulse(&mut ship, 45.0, 0.0, 0.0);
        assert!(nav.is_idle());
        assert_eq!(ship.heading, 45.0);
    }

    #[test]
    fn test_approach_stops_short() {
        let galaxy = Galaxy::default();
        let mut ship = ShipState::new(Quadrant::new(5, 5, 5));
        let destination = to_galactic(Quadrant::new(5, 5, 5), Vector3::new(5.0, 5.0, 5.0))
            .add(&Vector3::new(0.0, 12.0, 0.0));

        let mut nav = plot_approach(&ship, destination, 2.0).expect("course");
        run_until_idle(&mut nav, &mut ship, &galaxy);

        assert_approx_eq!(ship.galactic().distance(&destination), 2.0, 1e-6);
        assert_approx_eq!(ship.heading, 180.0, 1e-6);
        assert!(plot_approach(&ship, destination, 5.0).is_none());
    }
}
