//! Human-readable error descriptions and structured JSON error formatting.

use bodyscale_core::error::{BuildError, ScaleError, TransportKind};

fn transport_text(kind: TransportKind) -> &'static str {
    match kind {
        TransportKind::PermissionDenied => {
            "What happened: Bluetooth access was denied.\nLikely causes: The user declined the pairing prompt, or the process lacks Bluetooth permission.\nHow to fix: Grant Bluetooth access (on Linux, check bluetoothd and your group membership), then rerun."
        }
        TransportKind::Unsupported => {
            "What happened: Bluetooth is not available on this machine.\nLikely causes: No adapter, adapter powered off, or a build without the `ble` feature.\nHow to fix: Enable the adapter, or set link.backend = \"sim\" to use the simulator."
        }
        TransportKind::DeviceNotFound => {
            "What happened: No matching scale was found.\nLikely causes: Scale asleep, out of range, or its name does not match link.name_prefixes / link.names.\nHow to fix: Step on the scale to wake it, move closer, or adjust the name filters."
        }
        TransportKind::GattServer => {
            "What happened: Connecting to the scale's GATT server failed.\nLikely causes: The scale went back to sleep or another host is connected to it.\nHow to fix: Wake the scale and retry; disconnect other phones or apps first."
        }
        TransportKind::ServiceNotFound => {
            "What happened: The scale exposes none of the expected services.\nLikely causes: Unsupported model or firmware revision.\nHow to fix: Check the device with a BLE explorer and report its service list."
        }
        TransportKind::CharacteristicNotFound => {
            "What happened: The scale exposes no supported measurement characteristic.\nLikely causes: Unsupported firmware revision.\nHow to fix: Check the device with a BLE explorer and report its characteristic list."
        }
        TransportKind::Other => {
            "What happened: The link to the scale failed.\nLikely causes: Radio interference or the scale powered off mid-session.\nHow to fix: Retry; re-run with --log-level=debug for details."
        }
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingStore => {
                "What happened: No reading store was provided to the session.\nLikely causes: The history file could not be set up.\nHow to fix: Check store.path in the config.".to_string()
            }
            BuildError::MissingLink => {
                "What happened: No scale link was provided to the session.\nLikely causes: The link backend failed to initialize.\nHow to fix: Check link.backend in the config.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ScaleError>() {
        return match se {
            ScaleError::Transport { kind, message } => {
                format!("{}\nDetail: {message}", transport_text(*kind))
            }
            ScaleError::Persistence(msg) => format!(
                "What happened: The reading could not be saved ({msg}).\nLikely causes: History file not writable or its header was edited.\nHow to fix: Check store.path permissions and contents."
            ),
            ScaleError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML or rule CSV.\nHow to fix: Edit the config file, then rerun."
            ),
            ScaleError::Session(e) => format!(
                "What happened: The session refused the request ({e}).\nHow to fix: Re-run with --log-level=debug for details."
            ),
        };
    }

    let msg = err.to_string();
    if msg.to_ascii_lowercase().contains("must have headers") {
        return format!("Invalid headers in CSV file. {msg}");
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes; transport kinds each get their own.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 3;
    }
    match err.downcast_ref::<ScaleError>() {
        Some(ScaleError::Config(_)) => 3,
        Some(ScaleError::Persistence(_)) => 4,
        Some(ScaleError::Session(_)) => 5,
        Some(ScaleError::Transport { kind, .. }) => match kind {
            TransportKind::PermissionDenied => 10,
            TransportKind::Unsupported => 11,
            TransportKind::DeviceNotFound => 12,
            TransportKind::GattServer => 13,
            TransportKind::ServiceNotFound => 14,
            TransportKind::CharacteristicNotFound => 15,
            TransportKind::Other => 16,
        },
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "config";
    }
    match err.downcast_ref::<ScaleError>() {
        Some(ScaleError::Config(_)) => "config",
        Some(ScaleError::Persistence(_)) => "persistence",
        Some(ScaleError::Session(_)) => "session",
        Some(ScaleError::Transport { kind, .. }) => kind.as_str(),
        None => "error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kinds_have_distinct_codes() {
        let kinds = [
            TransportKind::PermissionDenied,
            TransportKind::Unsupported,
            TransportKind::DeviceNotFound,
            TransportKind::GattServer,
            TransportKind::ServiceNotFound,
            TransportKind::CharacteristicNotFound,
            TransportKind::Other,
        ];
        let mut codes: Vec<i32> = kinds
            .iter()
            .map(|k| exit_code_for_error(&eyre::Report::new(ScaleError::transport(*k, "x"))))
            .collect();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn json_error_carries_reason_and_code() {
        let err = eyre::Report::new(ScaleError::transport(TransportKind::DeviceNotFound, "gone"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "device_not_found");
        assert_eq!(v["exit_code"], 12);
        assert!(v["message"].as_str().unwrap().contains("name_prefixes"));
    }

    #[test]
    fn untyped_errors_fall_back_to_generic_text() {
        let err = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("Original: boom"));
    }
}
