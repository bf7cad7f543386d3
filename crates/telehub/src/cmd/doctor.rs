use std::net::TcpListener;
use std::path::Path;

use serde::Serialize;
use telehub::config::HubConfig;
use telehub::reader::ReaderInit;
use telehub::transport::{available_ports, bus_path, I2C_SUPPORTED};

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: impl Into<String>, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let mut checks = vec![serial_ports_check(), i2c_support_check()];
    if let Some(path) = &args.config {
        checks.extend(config_checks(path));
    }

    let has_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);
    let output = DoctorOutput {
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("telehub doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<22} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
    }
}

fn serial_ports_check() -> CheckResult {
    let ports = available_ports();
    if ports.is_empty() {
        CheckResult::new("serial_ports", CheckStatus::Info, "no serial ports found")
    } else {
        CheckResult::new("serial_ports", CheckStatus::Info, ports.join(", "))
    }
}

fn i2c_support_check() -> CheckResult {
    if I2C_SUPPORTED {
        CheckResult::new("i2c_support", CheckStatus::Pass, "i2c readers available")
    } else {
        CheckResult::new(
            "i2c_support",
            CheckStatus::Info,
            "built without the i2c feature; bus readers will fail to start",
        )
    }
}

fn config_checks(path: &Path) -> Vec<CheckResult> {
    let config = match HubConfig::load(path) {
        Ok(config) => config,
        Err(err) => {
            return vec![CheckResult::new("config", CheckStatus::Fail, err.to_string())];
        }
    };

    let mut checks = vec![CheckResult::new(
        "config",
        CheckStatus::Pass,
        format!(
            "{} readers, {} nodes",
            config.readers.len(),
            config.nodes.len()
        ),
    )];

    for (name, section) in &config.readers {
        let check_name = format!("reader:{name}");
        let check = match section.reader_init() {
            Ok(None) => CheckResult::new(check_name, CheckStatus::Warn, "no type, ignored"),
            Ok(Some(init)) => reader_check(check_name, &init),
            Err(err) => CheckResult::new(check_name, CheckStatus::Fail, err.to_string()),
        };
        checks.push(check);
    }
    checks
}

fn reader_check(name: String, init: &ReaderInit) -> CheckResult {
    match init {
        ReaderInit::Serial(init) => device_check(name, &init.port),
        ReaderInit::Radio(init) => device_check(name, &init.port),
        ReaderInit::Bus(init) => {
            if !I2C_SUPPORTED {
                return CheckResult::new(name, CheckStatus::Fail, "i2c support not compiled in");
            }
            device_check(name, &bus_path(init.bus))
        }
        ReaderInit::Socket(init) => match TcpListener::bind(("0.0.0.0", init.port)) {
            Ok(_) => CheckResult::new(name, CheckStatus::Pass, format!("port {} available", init.port)),
            Err(err) => CheckResult::new(
                name,
                CheckStatus::Fail,
                format!("port {} unavailable: {err}", init.port),
            ),
        },
    }
}

fn device_check(name: String, path: &Path) -> CheckResult {
    if path.exists() {
        CheckResult::new(name, CheckStatus::Pass, format!("{} present", path.display()))
    } else {
        CheckResult::new(name, CheckStatus::Fail, format!("{} not found", path.display()))
    }
}
