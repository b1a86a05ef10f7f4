use watering_core::Timestamp;
use watering_core::config::patch::PatchError;
use watering_core::config::{ConfigError, ConfigKind, ControlConfig, HardwareConfig, WateringWindow};
use watering_core::console::grammar::{Keyword, ParseErrorKind};
use watering_core::console::{CommandError, CommandOutcome, execute};
use watering_core::controller::WateringController;
use watering_core::schedule::{EVENT_LOG_CAPACITY, NoopEventStore};
use watering_core::sequencer::{ActuationState, Actuators, PumpId, ValveCoils};

const NOW: Timestamp = 19_676 * 86_400 + 3_600;

#[test]
fn trigger_command_queues_a_console_request() {
    let mut controller = controller();
    let mut out = String::new();

    let outcome = execute("trigger", &mut controller, NOW, &mut out).expect("trigger parses");
    assert_eq!(outcome, CommandOutcome::TriggerQueued);
    assert_eq!(out, "trigger queued\n");
    assert_eq!(controller.status().pending_triggers, 1);

    let mut actuators = NullActuators::default();
    let report = controller.tick(NOW + 1, &mut actuators, &mut NoopEventStore);
    assert_eq!(report.state, ActuationState::ValveClosing);
}

#[test]
fn set_applies_every_assignment_atomically() {
    let mut controller = controller();
    let mut out = String::new();

    execute("set control kp=0.5 kidec=0.2", &mut controller, NOW, &mut out)
        .expect("valid assignments");
    assert!((controller.control_config().kp - 0.5).abs() < f64::EPSILON);
    assert!((controller.control_config().kidec - 0.2).abs() < f64::EPSILON);
    assert_eq!(out, "control config applied\n");
}

#[test]
fn invalid_value_leaves_config_untouched() {
    let mut controller = controller();
    let mut out = String::new();

    let error = execute("set control kp=0.5 kidec=3", &mut controller, NOW, &mut out)
        .expect_err("kidec out of range");
    assert_eq!(
        error,
        CommandError::Rejected(ConfigKind::Control, ConfigError::OutOfRange("kidec"))
    );
    assert_eq!(controller.control_config(), &ControlConfig::default());
    assert!(out.is_empty());

    let error = execute("set hw water_pump_time_s=soon", &mut controller, NOW, &mut out)
        .expect_err("non-numeric value");
    assert_eq!(
        error,
        CommandError::Patch(PatchError::InvalidValue {
            key: "water_pump_time_s",
            value: "soon"
        })
    );
    assert_eq!(controller.hardware_config(), &HardwareConfig::default());
}

#[test]
fn enormous_time_window_is_rejected_for_log_capacity() {
    let mut controller = controller();
    let mut out = String::new();

    let error = execute("set control time_window_days=1e20", &mut controller, NOW, &mut out)
        .expect_err("window cannot fit in the log");
    assert_eq!(
        error,
        CommandError::Rejected(
            ConfigKind::Control,
            ConfigError::EventLogCapacity {
                required: usize::MAX,
                capacity: EVENT_LOG_CAPACITY,
            }
        )
    );
    assert_eq!(controller.control_config(), &ControlConfig::default());
    assert!(out.is_empty());
}

#[test]
fn unknown_keys_are_named_in_the_error() {
    let mut controller = controller();
    let mut out = String::new();

    let error = execute("set hw speed=3", &mut controller, NOW, &mut out).expect_err("unknown key");
    assert_eq!(error.to_string(), "unknown hw key `speed`");
}

#[test]
fn windows_command_replaces_the_window_list() {
    let mut controller = controller();
    let mut out = String::new();

    let outcome = execute("windows 06:30-07:00 18:00-18:45", &mut controller, NOW, &mut out)
        .expect("valid windows");
    assert_eq!(outcome, CommandOutcome::Applied(ConfigKind::Control));
    assert_eq!(
        controller.control_config().watering_windows.as_slice(),
        &[
            WateringWindow::from_clock(6, 30, 7, 0),
            WateringWindow::from_clock(18, 0, 18, 45),
        ]
    );
    assert_eq!(out, "windows=06:30-07:00 18:00-18:45\n");
}

#[test]
fn overlapping_windows_are_rejected() {
    let mut controller = controller();
    let mut out = String::new();

    let error = execute("windows 06:00-08:00 07:00-09:00", &mut controller, NOW, &mut out)
        .expect_err("overlap");
    assert_eq!(
        error,
        CommandError::Rejected(ConfigKind::Control, ConfigError::WindowsOverlap(1))
    );
    assert_eq!(
        controller.control_config().watering_windows,
        ControlConfig::default().watering_windows
    );
}

#[test]
fn config_prints_both_sections() {
    let mut controller = controller();
    let mut out = String::new();

    execute("config", &mut controller, NOW, &mut out).expect("config parses");
    assert!(out.contains("[control]\n"));
    assert!(out.contains("deadtime_sec=600\n"));
    assert!(out.contains("windows=09:00-09:15 19:00-21:00\n"));
    assert!(out.contains("[hw]\n"));
    assert!(out.contains("nutrient_flow_ml_per_sec=1.58\n"));

    out.clear();
    execute("config hw", &mut controller, NOW, &mut out).expect("config hw parses");
    assert!(!out.contains("[control]"));
}

#[test]
fn status_reports_state_and_counts() {
    let mut controller = controller();
    let mut out = String::new();

    execute("status", &mut controller, NOW, &mut out).expect("status parses");
    assert!(out.starts_with("state=idle since=0 waterings=0 pending=0\n"));
    assert!(out.contains("last=never"));
}

#[test]
fn advance_is_left_to_the_host() {
    let mut controller = controller();
    let mut out = String::new();
    assert_eq!(
        execute("advance 3h", &mut controller, NOW, &mut out),
        Ok(CommandOutcome::Advance(10_800))
    );
}

#[test]
fn log_shows_the_newest_records() {
    let mut controller = controller();
    let mut actuators = NullActuators::default();
    controller.start(NOW, &mut actuators, &mut NoopEventStore);
    let mut out = String::new();

    execute("log 1", &mut controller, NOW, &mut out).expect("log parses");
    assert_eq!(out.lines().count(), 1);
    assert!(out.contains("event-log-restored"));
}

#[test]
fn parse_errors_carry_usage() {
    let mut controller = controller();
    let mut out = String::new();

    let error = execute("advance soon", &mut controller, NOW, &mut out).expect_err("bad duration");
    match error {
        CommandError::Parse(parse) => {
            assert_eq!(parse.kind, ParseErrorKind::Usage(Keyword::Advance));
            assert_eq!(
                parse.to_string(),
                "unexpected `soon`; usage: advance <count>[s|m|h|d]"
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn help_lists_every_command() {
    let mut controller = controller();
    let mut out = String::new();

    execute("help", &mut controller, NOW, &mut out).expect("help parses");
    for keyword in Keyword::ALL {
        assert!(out.contains(keyword.name()), "help is missing {keyword}");
    }

    out.clear();
    execute("help set", &mut controller, NOW, &mut out).expect("help set parses");
    assert!(out.contains("control keys: setpoint, liters_per_event"));
}

fn controller() -> WateringController {
    WateringController::new(ControlConfig::default(), HardwareConfig::default())
        .expect("default configs are valid")
}

#[derive(Default)]
struct NullActuators {
    coils: ValveCoils,
}

impl Actuators for NullActuators {
    fn close_valve(&mut self) {
        self.coils = ValveCoils {
            open: false,
            close: true,
        };
    }

    fn open_valve(&mut self) {
        self.coils = ValveCoils {
            open: true,
            close: false,
        };
    }

    fn set_pump_duty(&mut self, _pump: PumpId, _percent: u8) {}

    fn valve_coils(&self) -> ValveCoils {
        self.coils
    }
}
