//! # Operator Menu
//!
//! The interactive front end of the arm executable. [`run`] brings the arm up, loops over the
//! operator's menu choices and always releases the arm at the end, whichever way the loop exits.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use std::{
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    arm_session::{jog, ArmSession, InitReport, SessionError},
    console::{Console, ConsoleError},
    params::ArmExecParams,
};
use comms_if::eqpt::arm::{ArmApi, JointIndex, JointVector, NUM_JOINTS};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A choice from the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    MoveJoint,
    GoHome,
    ShowPosition,
    Exit,
}

/// How the menu loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    /// The operator chose to exit.
    Exit,

    /// The operator pressed Ctrl+C.
    Interrupted,

    /// Input was closed, or could no longer be read.
    EndOfInput,
}

/// Invalid operator input. None of these have any side effects on the arm.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("Invalid choice. Please enter 1-4.")]
    InvalidChoice(String),

    #[error("Invalid input. Please enter numbers only.")]
    NotANumber(String),

    #[error("Invalid joint number. Must be 1-{}.", NUM_JOINTS)]
    InvalidJoint(i64),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Run a complete operator session on `arm`.
///
/// The arm is initialised, the menu loop runs until the operator leaves it, and the arm is
/// disconnected. Only a failure to connect is returned as an error, in which case the menu is
/// never entered.
///
/// `stop` is set from outside (by the Ctrl+C handler) while an operation is blocking. The menu is
/// left as soon as the current operation finishes.
pub fn run<A, C>(
    arm: A,
    params: ArmExecParams,
    console: &mut C,
    stop: &AtomicBool,
) -> Result<ExitReason, SessionError>
where
    A: ArmApi,
    C: Console,
{
    console.say(&format!("Connecting to the arm at {}...", params.arm_endpoint));

    let mut session = ArmSession::new(arm, params);

    let outcome = match session.initialize() {
        Ok(report) => {
            show_init_report(&session, &report, console);
            Ok(menu_loop(&mut session, console, stop))
        }
        Err(e) => {
            console.say(&format!("Error connecting to arm: {}", e));
            Err(e)
        }
    };

    console.say("Disconnecting...");
    session.shutdown();
    console.say("Done.");

    outcome
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn menu_loop<A: ArmApi, C: Console>(
    session: &mut ArmSession<A>,
    console: &mut C,
    stop: &AtomicBool,
) -> ExitReason {
    console.say("\n=== Arm Interactive Controller ===");
    console.say("Use this tool to safely move individual joints");
    console.say("==================================");

    loop {
        if stop.load(Ordering::SeqCst) {
            console.say("\n\nExiting due to Ctrl+C...");
            info!("Stop requested, leaving the menu");
            return ExitReason::Interrupted;
        }

        console.say("\nOptions:");
        console.say("1. Move single joint");
        console.say("2. Go to home position");
        console.say("3. Show current position");
        console.say("4. Exit");

        let result = console
            .read_line("\nEnter choice (1-4): ")
            .and_then(|line| match line.parse::<MenuChoice>() {
                Ok(MenuChoice::MoveJoint) => move_single_joint(session, console).map(|_| None),
                Ok(MenuChoice::GoHome) => {
                    go_home(session, console);
                    Ok(None)
                }
                Ok(MenuChoice::ShowPosition) => {
                    show_position(session, console);
                    Ok(None)
                }
                Ok(MenuChoice::Exit) => Ok(Some(ExitReason::Exit)),
                Err(e) => {
                    console.say(&e.to_string());
                    Ok(None)
                }
            });

        match result {
            Ok(None) => (),
            Ok(Some(reason)) => {
                console.say("Exiting...");
                info!("Operator exited the menu");
                return reason;
            }
            Err(ConsoleError::Interrupted) => {
                console.say("\n\nExiting due to Ctrl+C...");
                info!("Operator interrupted the menu");
                return ExitReason::Interrupted;
            }
            Err(ConsoleError::Eof) => {
                console.say("\nEnd of input, exiting...");
                info!("Operator input closed");
                return ExitReason::EndOfInput;
            }
            Err(e) => {
                console.say(&format!("Error: {}", e));
                warn!("Leaving the menu: {}", e);
                return ExitReason::EndOfInput;
            }
        }
    }
}

fn show_init_report<A: ArmApi, C: Console>(
    session: &ArmSession<A>,
    report: &InitReport,
    console: &mut C,
) {
    if let Some(s) = report.initial_state {
        console.say(&format!("Initial arm state: {}", s));
    }
    if let Some(s) = report.settled_state {
        console.say(&format!("Arm state after setup: {}", s));
        if report.recovered {
            console.say(&format!("Error detected: state {}. Cleared errors.", s));
        }
    }

    for fault in report.faults.iter() {
        console.say(&format!("Warning: {}", fault));
    }

    if report.homed {
        console.say(&format!(
            "✓ Successfully moved to home position {}",
            session.params().home_pos_deg
        ));
    } else {
        console.say("✗ Failed to reach home position");
        console.say("Warning: Continuing without home position - be extra careful!");
    }

    if report.is_degraded() {
        console.say(&format!(
            "Warning: {} step(s) of initialisation failed, continuing in degraded mode",
            report.faults.len()
        ));
    }
}

fn show_joint_info<C: Console>(console: &mut C) {
    console.say("\n=== Arm Joint Information ===");
    for joint in JointIndex::all() {
        console.say(&format!(
            "Joint {} ({}): + = {}",
            joint,
            joint.name(),
            joint.positive_direction()
        ));
    }
    console.say("All angles in degrees, typical range: -180 to +180");
    console.say("=============================\n");
}

/// Read and show the current position, returning it if it could be read.
fn show_position<A: ArmApi, C: Console>(
    session: &mut ArmSession<A>,
    console: &mut C,
) -> Option<JointVector> {
    match session.read_position() {
        Ok(p) => {
            console.say(&format!("Current joint positions: {}", p));
            Some(p)
        }
        Err(e) => {
            console.say(&format!("Error getting current position: {}", e));
            None
        }
    }
}

fn go_home<A: ArmApi, C: Console>(session: &mut ArmSession<A>, console: &mut C) {
    console.say("Moving to home position...");
    console.say(&format!("Target position: {}", session.params().home_pos_deg));

    match session.go_home() {
        Ok(()) => console.say("✓ Home position reached successfully!"),
        Err(e) => console.say(&format!("✗ Failed to reach home position: {}", failure(&e))),
    }
}

/// Interactively jog a single joint.
///
/// Only console errors are returned, every other problem is reported to the operator and the
/// step ends without moving the arm.
fn move_single_joint<A: ArmApi, C: Console>(
    session: &mut ArmSession<A>,
    console: &mut C,
) -> Result<(), ConsoleError> {
    show_joint_info(console);

    let current = match show_position(session, console) {
        Some(p) => p,
        None => return Ok(()),
    };

    console.say(&format!(
        "Select joint to move (1-{}) or 0 to return to menu:",
        NUM_JOINTS
    ));
    let joint = match parse_joint(&console.read_line("Joint number: ")?) {
        Ok(Some(j)) => j,
        Ok(None) => return Ok(()),
        Err(e) => {
            console.say(&e.to_string());
            return Ok(());
        }
    };

    console.say(&format!(
        "Current angle for Joint {}: {:.1}°",
        joint,
        current.get(joint)
    ));
    let delta_deg = match parse_number(&console.read_line("Enter angle change in degrees (+/-): ")?)
    {
        Ok(d) => d,
        Err(e) => {
            console.say(&e.to_string());
            return Ok(());
        }
    };

    let params = session.params().clone();

    let confirmed = jog::needs_confirmation(delta_deg, params.confirm_threshold_deg);
    if confirmed {
        console.say("Warning: Large movement detected!");
        let answer = console.read_line("Are you sure? (y/N): ")?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            console.say("Movement cancelled.");
            return Ok(());
        }
    }

    let target = match jog::plan_joint_delta(&current, joint, delta_deg, params.joint_limit_deg) {
        Ok(t) => t,
        Err(e) => {
            console.say(&format!("Error: {}", e));
            return Ok(());
        }
    };

    let speed_prompt = format!(
        "Enter movement speed ({}-{} degrees/sec, recommended 5-10): ",
        params.min_speed_degs, params.max_speed_degs
    );
    let speed_degs = match parse_number(&console.read_line(&speed_prompt)?)
        .map(|s| jog::clamp_speed(s, params.min_speed_degs, params.max_speed_degs))
    {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => {
            console.say(&format!("Error: {}", e));
            return Ok(());
        }
        Err(e) => {
            console.say(&e.to_string());
            return Ok(());
        }
    };

    console.say(&format!(
        "Moving Joint {} by {}° at {}°/s...",
        joint, delta_deg, speed_degs
    ));
    console.say(&format!("New position will be: {}", target));

    match session.apply_joint_delta(joint, delta_deg, speed_degs, confirmed) {
        Ok(_) => console.say("✓ Movement completed successfully!"),
        Err(e) => console.say(&format!("✗ Movement failed: {}", failure(&e))),
    }

    Ok(())
}

/// Describe a failed call the way the operator expects, by its controller code where possible.
fn failure(e: &SessionError) -> String {
    match e.controller_code() {
        Some(c) => format!("error code {}", c),
        None => e.to_string(),
    }
}

/// Parse a joint number, `0` meaning no joint.
fn parse_joint(line: &str) -> Result<Option<JointIndex>, InputError> {
    let number: i64 = line
        .trim()
        .parse()
        .map_err(|_| InputError::NotANumber(line.to_string()))?;

    match number {
        0 => Ok(None),
        n if n > 0 => JointIndex::new(n as usize)
            .map(Some)
            .ok_or(InputError::InvalidJoint(n)),
        n => Err(InputError::InvalidJoint(n)),
    }
}

/// Parse a finite number.
fn parse_number(line: &str) -> Result<f64, InputError> {
    match line.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(InputError::NotANumber(line.to_string())),
    }
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FromStr for MenuChoice {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(MenuChoice::MoveJoint),
            "2" => Ok(MenuChoice::GoHome),
            "3" => Ok(MenuChoice::ShowPosition),
            "4" => Ok(MenuChoice::Exit),
            other => Err(InputError::InvalidChoice(other.to_string())),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ScriptedConsole;
    use comms_if::eqpt::arm::{sim::SimArm, ArmCall, ArmError, ArmMode, ArmState};

    const HOME: JointVector = JointVector([103.7, -24.3, -1.9, 26.2, 14.8]);

    fn params() -> ArmExecParams {
        ArmExecParams {
            settle_time_s: 0.0,
            ..Default::default()
        }
    }

    fn run_script(
        arm: &mut SimArm,
        console: &mut ScriptedConsole,
    ) -> Result<ExitReason, SessionError> {
        run(arm, params(), console, &AtomicBool::new(false))
    }

    /// A simulated arm where Ctrl+C is pressed while an operator move is underway.
    struct InterruptedMove<'a> {
        arm: &'a mut SimArm,
        stop: &'a AtomicBool,
    }

    impl ArmApi for InterruptedMove<'_> {
        fn connect(&mut self) -> Result<(), ArmError> {
            self.arm.connect()
        }

        fn disconnect(&mut self) -> Result<(), ArmError> {
            self.arm.disconnect()
        }

        fn clean_error(&mut self) -> Result<(), ArmError> {
            self.arm.clean_error()
        }

        fn motion_enable(&mut self, enable: bool) -> Result<(), ArmError> {
            self.arm.motion_enable(enable)
        }

        fn set_mode(&mut self, mode: ArmMode) -> Result<(), ArmError> {
            self.arm.set_mode(mode)
        }

        fn set_state(&mut self, state: ArmState) -> Result<(), ArmError> {
            self.arm.set_state(state)
        }

        fn set_servo_angle(
            &mut self,
            angles_deg: &JointVector,
            speed_degs: f64,
            wait: bool,
        ) -> Result<(), ArmError> {
            // The first move is the home move during initialisation
            if self.arm.count(ArmCall::SetServoAngle) > 0 {
                self.stop.store(true, Ordering::SeqCst);
            }
            self.arm.set_servo_angle(angles_deg, speed_degs, wait)
        }

        fn get_servo_angle(&mut self) -> Result<JointVector, ArmError> {
            self.arm.get_servo_angle()
        }

        fn get_state(&mut self) -> Result<i32, ArmError> {
            self.arm.get_state()
        }
    }

    /// Operator moves after the initial home move.
    fn jogs(arm: &SimArm) -> Vec<(JointVector, f64)> {
        arm.moves().into_iter().skip(1).collect()
    }

    #[test]
    fn test_menu_choice_parsing() {
        assert_eq!(" 1 ".parse::<MenuChoice>(), Ok(MenuChoice::MoveJoint));
        assert_eq!("4".parse::<MenuChoice>(), Ok(MenuChoice::Exit));
        assert!("5".parse::<MenuChoice>().is_err());
        assert!("".parse::<MenuChoice>().is_err());
    }

    #[test]
    fn test_input_parsing() {
        assert_eq!(parse_joint("0"), Ok(None));
        assert_eq!(parse_joint(" 5"), Ok(JointIndex::new(5)));
        assert_eq!(parse_joint("6"), Err(InputError::InvalidJoint(6)));
        assert_eq!(parse_joint("-1"), Err(InputError::InvalidJoint(-1)));
        assert!(matches!(parse_joint("two"), Err(InputError::NotANumber(_))));
        assert_eq!(parse_number("-12.5"), Ok(-12.5));
        assert!(parse_number("nan").is_err());
        assert!(parse_number("inf").is_err());
        assert!(parse_number("ten").is_err());
    }

    #[test]
    fn test_jog_shoulder() {
        let mut arm = SimArm::new();
        let mut console = ScriptedConsole::new(&["1", "2", "10", "7", "4"]);

        let reason = run_script(&mut arm, &mut console).unwrap();

        assert_eq!(reason, ExitReason::Exit);
        let moves = jogs(&arm);
        assert_eq!(moves.len(), 1);
        let (target, speed) = moves[0];
        assert_eq!(speed, 7.0);
        let expected = [103.7, -14.3, -1.9, 26.2, 14.8];
        for (a, e) in target.0.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-9);
        }
        assert!(console.shown("New position will be: [103.7, -14.3, -1.9, 26.2, 14.8]"));
        assert!(console.shown("✓ Movement completed successfully!"));
        assert_eq!(arm.count(ArmCall::Disconnect), 1);
    }

    #[test]
    fn test_speed_is_clamped() {
        let mut arm = SimArm::new();
        let mut console = ScriptedConsole::new(&["1", "1", "5", "0", "1", "1", "5", "45", "4"]);

        run_script(&mut arm, &mut console).unwrap();

        let speeds: Vec<f64> = jogs(&arm).iter().map(|(_, s)| *s).collect();
        assert_eq!(speeds, vec![1.0, 30.0]);
    }

    #[test]
    fn test_large_move_confirmation() {
        let mut arm = SimArm::new();
        let mut console = ScriptedConsole::new(&["1", "3", "45", "n", "4"]);
        run_script(&mut arm, &mut console).unwrap();

        assert!(jogs(&arm).is_empty());
        assert!(console.shown("Warning: Large movement detected!"));
        assert!(console.shown("Movement cancelled."));

        let mut arm = SimArm::new();
        let mut console = ScriptedConsole::new(&["1", "3", "45", "Y", "5", "4"]);
        run_script(&mut arm, &mut console).unwrap();

        let moves = jogs(&arm);
        assert_eq!(moves.len(), 1);
        assert!((moves[0].0 .0[2] - 43.1).abs() < 1e-9);
    }

    #[test]
    fn test_limit_exceeded() {
        let mut arm = SimArm::new();
        let mut console = ScriptedConsole::new(&["1", "1", "90", "y", "4"]);
        run_script(&mut arm, &mut console).unwrap();

        assert!(jogs(&arm).is_empty());
        assert!(console.shown("exceeding the safe limits"));
    }

    #[test]
    fn test_invalid_input_has_no_side_effects() {
        let mut arm = SimArm::new();
        let mut console =
            ScriptedConsole::new(&["9", "1", "x", "1", "7", "1", "2", "abc", "1", "0", "4"]);
        let reason = run_script(&mut arm, &mut console).unwrap();

        assert_eq!(reason, ExitReason::Exit);
        assert!(jogs(&arm).is_empty());
        assert!(console.shown("Invalid choice. Please enter 1-4."));
        assert!(console.shown("Invalid input. Please enter numbers only."));
        assert!(console.shown("Invalid joint number. Must be 1-5."));
    }

    #[test]
    fn test_go_home_and_show_position() {
        let mut arm = SimArm::new();
        let mut console = ScriptedConsole::new(&["1", "5", "-10", "5", "3", "2", "3", "4"]);
        run_script(&mut arm, &mut console).unwrap();

        let moves = jogs(&arm);
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[1], (HOME, 10.0));
        assert_eq!(arm.angles_deg, HOME);
        assert!(console.shown("Current joint positions: [103.7, -24.3, -1.9, 26.2, 4.8]"));
        assert!(console.shown("✓ Home position reached successfully!"));
    }

    #[test]
    fn test_init_failure_still_enters_menu() {
        let mut arm = SimArm::new();
        arm.inject_fault(ArmCall::MotionEnable, 11);
        let mut console = ScriptedConsole::new(&["1", "2", "5", "5", "4"]);

        let reason = run_script(&mut arm, &mut console).unwrap();

        assert_eq!(reason, ExitReason::Exit);
        assert!(console.shown("Warning: MotionEnable failed"));
        assert!(console.shown("Warning: Continuing without home position"));
        assert!(console.shown("Options:"));
        // The arm isn't enabled so the jog fails on the controller, and is reported
        assert!(console.shown("✗ Movement failed: error code"));
        assert_eq!(arm.count(ArmCall::Disconnect), 1);
    }

    #[test]
    fn test_disconnect_once_on_every_exit() {
        let mut arm = SimArm::new();
        let mut console = ScriptedConsole::interrupted_after(&["3"]);
        assert_eq!(
            run_script(&mut arm, &mut console).unwrap(),
            ExitReason::Interrupted
        );
        assert!(console.shown("Exiting due to Ctrl+C"));
        assert_eq!(arm.count(ArmCall::Disconnect), 1);

        // Interrupted in the middle of a jog
        let mut arm = SimArm::new();
        let mut console = ScriptedConsole::interrupted_after(&["1", "2"]);
        assert_eq!(
            run_script(&mut arm, &mut console).unwrap(),
            ExitReason::Interrupted
        );
        assert!(jogs(&arm).is_empty());
        assert_eq!(arm.count(ArmCall::Disconnect), 1);

        let mut arm = SimArm::new();
        let mut console = ScriptedConsole::new(&[]);
        assert_eq!(
            run_script(&mut arm, &mut console).unwrap(),
            ExitReason::EndOfInput
        );
        assert_eq!(arm.count(ArmCall::Disconnect), 1);

        let mut arm = SimArm::new();
        arm.unreachable = true;
        let mut console = ScriptedConsole::new(&["4"]);
        assert!(run_script(&mut arm, &mut console).is_err());
        assert!(console.shown("Error connecting to arm"));
        assert!(!console.shown("Options:"));
        assert_eq!(arm.count(ArmCall::Disconnect), 1);
    }
    #[test]
    fn test_stop_during_move_disconnects_once() {
        let mut arm = SimArm::new();
        let stop = AtomicBool::new(false);
        let mut console = ScriptedConsole::new(&["1", "1", "5", "5", "3", "4"]);

        let reason = run(
            InterruptedMove {
                arm: &mut arm,
                stop: &stop,
            },
            params(),
            &mut console,
            &stop,
        )
        .unwrap();

        assert_eq!(reason, ExitReason::Interrupted);
        // The move in progress completes, nothing after it runs
        assert_eq!(jogs(&arm).len(), 1);
        assert!(console.shown("✓ Movement completed successfully!"));
        assert!(!console.shown("Current joint positions: [108.7"));
        assert!(console.shown("Exiting due to Ctrl+C"));
        assert_eq!(arm.count(ArmCall::Disconnect), 1);
    }

    #[test]
    fn test_stop_before_menu() {
        let mut arm = SimArm::new();
        let mut console = ScriptedConsole::new(&["1", "1", "5", "5", "4"]);

        let reason = run(&mut arm, params(), &mut console, &AtomicBool::new(true)).unwrap();

        assert_eq!(reason, ExitReason::Interrupted);
        assert!(jogs(&arm).is_empty());
        assert!(!console.shown("Options:"));
        assert_eq!(arm.count(ArmCall::Disconnect), 1);
    }

    #[test]
    fn test_position_read_failure_returns_to_menu() {
        let mut arm = SimArm::new();
        arm.inject_fault(ArmCall::GetServoAngle, 7);
        let mut console = ScriptedConsole::new(&["3", "1", "4"]);

        let reason = run_script(&mut arm, &mut console).unwrap();

        assert_eq!(reason, ExitReason::Exit);
        let failures = console
            .output
            .iter()
            .filter(|l| l.starts_with("Error getting current position"))
            .count();
        assert_eq!(failures, 2);
        assert!(!console.shown("Joint number: "));
        assert!(jogs(&arm).is_empty());
        assert_eq!(arm.count(ArmCall::Disconnect), 1);
    }
}
