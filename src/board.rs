//! Jetson model detection and BOARD-mode pin data.
//!
//! The relay tools address pins by their physical number on the 40-pin
//! header (BOARD numbering). Each header pin maps to a line on one of the
//! Tegra GPIO controllers; the line number and the exported sysfs name both
//! depend on the kernel generation, which is why every definition is keyed
//! by the controller's `ngpio` value.

use std::{env, fs, path::Path};

use crate::error::{Error, Result};

/// Jetson models with pin tables in this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Model {
    Orin,
    XavierNx,
}

impl Model {
    pub fn name(self) -> &'static str {
        match self {
            Model::Orin => "Jetson Orin",
            Model::XavierNx => "Jetson Xavier NX",
        }
    }
}

/// Static definition of one header pin.
///
/// * `board` - physical pin number on the 40-pin header
/// * `chip` - GPIO controller sysfs name under `/sys/devices`
/// * `lines` - `(ngpio, chip-relative line)` per kernel generation
/// * `names` - `(ngpio, exported line name)`; kernels without an entry
///   export the line as `gpio<global>`
struct PinDef {
    board: u32,
    chip: &'static str,
    lines: &'static [(u32, u32)],
    names: &'static [(u32, &'static str)],
}

static ORIN_PIN_DEFS: &[PinDef] = &[
    PinDef { board: 7, chip: "2200000.gpio", lines: &[(164, 106)], names: &[(164, "PQ.06")] },
    PinDef { board: 11, chip: "2200000.gpio", lines: &[(164, 112)], names: &[(164, "PR.04")] },
    PinDef { board: 12, chip: "2200000.gpio", lines: &[(164, 50)], names: &[(164, "PH.07")] },
    PinDef { board: 13, chip: "2200000.gpio", lines: &[(164, 108)], names: &[(164, "PR.00")] },
    PinDef { board: 15, chip: "2200000.gpio", lines: &[(164, 85)], names: &[(164, "PN.01")] },
    PinDef { board: 16, chip: "c2f0000.gpio", lines: &[(32, 9)], names: &[(32, "PBB.01")] },
    PinDef { board: 18, chip: "2200000.gpio", lines: &[(164, 43)], names: &[(164, "PH.00")] },
    PinDef { board: 19, chip: "2200000.gpio", lines: &[(164, 135)], names: &[(164, "PZ.05")] },
    PinDef { board: 21, chip: "2200000.gpio", lines: &[(164, 134)], names: &[(164, "PZ.04")] },
    PinDef { board: 22, chip: "2200000.gpio", lines: &[(164, 96)], names: &[(164, "PP.04")] },
    PinDef { board: 23, chip: "2200000.gpio", lines: &[(164, 133)], names: &[(164, "PZ.03")] },
    PinDef { board: 24, chip: "2200000.gpio", lines: &[(164, 136)], names: &[(164, "PZ.06")] },
    PinDef { board: 26, chip: "2200000.gpio", lines: &[(164, 137)], names: &[(164, "PZ.07")] },
    PinDef { board: 29, chip: "c2f0000.gpio", lines: &[(32, 1)], names: &[(32, "PAA.01")] },
    PinDef { board: 31, chip: "c2f0000.gpio", lines: &[(32, 0)], names: &[(32, "PAA.00")] },
    PinDef { board: 32, chip: "c2f0000.gpio", lines: &[(32, 8)], names: &[(32, "PBB.00")] },
    PinDef { board: 33, chip: "c2f0000.gpio", lines: &[(32, 2)], names: &[(32, "PAA.02")] },
    PinDef { board: 35, chip: "2200000.gpio", lines: &[(164, 53)], names: &[(164, "PI.02")] },
    PinDef { board: 36, chip: "2200000.gpio", lines: &[(164, 113)], names: &[(164, "PR.05")] },
    PinDef { board: 37, chip: "c2f0000.gpio", lines: &[(32, 3)], names: &[(32, "PAA.03")] },
    PinDef { board: 38, chip: "2200000.gpio", lines: &[(164, 52)], names: &[(164, "PI.01")] },
    PinDef { board: 40, chip: "2200000.gpio", lines: &[(164, 51)], names: &[(164, "PI.00")] },
];

static XAVIER_NX_PIN_DEFS: &[PinDef] = &[
    PinDef { board: 7, chip: "2200000.gpio", lines: &[(224, 148), (169, 118)], names: &[(169, "PS.04")] },
    PinDef { board: 11, chip: "2200000.gpio", lines: &[(224, 140), (169, 112)], names: &[(169, "PR.04")] },
    PinDef { board: 12, chip: "2200000.gpio", lines: &[(224, 157), (169, 127)], names: &[(169, "PT.05")] },
    PinDef { board: 13, chip: "2200000.gpio", lines: &[(224, 192), (169, 149)], names: &[(169, "PY.00")] },
    PinDef { board: 15, chip: "c2f0000.gpio", lines: &[(40, 20), (30, 16)], names: &[(30, "PCC.04")] },
    PinDef { board: 16, chip: "2200000.gpio", lines: &[(224, 196), (169, 153)], names: &[(169, "PY.04")] },
    PinDef { board: 18, chip: "2200000.gpio", lines: &[(224, 195), (169, 152)], names: &[(169, "PY.03")] },
    PinDef { board: 19, chip: "2200000.gpio", lines: &[(224, 205), (169, 162)], names: &[(169, "PZ.05")] },
    PinDef { board: 21, chip: "2200000.gpio", lines: &[(224, 204), (169, 161)], names: &[(169, "PZ.04")] },
    PinDef { board: 22, chip: "2200000.gpio", lines: &[(224, 193), (169, 150)], names: &[(169, "PY.01")] },
    PinDef { board: 23, chip: "2200000.gpio", lines: &[(224, 203), (169, 160)], names: &[(169, "PZ.03")] },
    PinDef { board: 24, chip: "2200000.gpio", lines: &[(224, 206), (169, 163)], names: &[(169, "PZ.06")] },
    PinDef { board: 26, chip: "2200000.gpio", lines: &[(224, 207), (169, 164)], names: &[(169, "PZ.07")] },
    PinDef { board: 29, chip: "2200000.gpio", lines: &[(224, 133), (169, 105)], names: &[(169, "PQ.05")] },
    PinDef { board: 31, chip: "2200000.gpio", lines: &[(224, 134), (169, 106)], names: &[(169, "PQ.06")] },
    PinDef { board: 32, chip: "2200000.gpio", lines: &[(224, 136), (169, 108)], names: &[(169, "PR.00")] },
    PinDef { board: 33, chip: "2200000.gpio", lines: &[(224, 105), (169, 84)], names: &[(169, "PN.01")] },
    PinDef { board: 35, chip: "2200000.gpio", lines: &[(224, 160), (169, 130)], names: &[(169, "PU.00")] },
    PinDef { board: 36, chip: "2200000.gpio", lines: &[(224, 141), (169, 113)], names: &[(169, "PR.05")] },
    PinDef { board: 37, chip: "2200000.gpio", lines: &[(224, 194), (169, 151)], names: &[(169, "PY.02")] },
    PinDef { board: 38, chip: "2200000.gpio", lines: &[(224, 159), (169, 129)], names: &[(169, "PT.07")] },
    PinDef { board: 40, chip: "2200000.gpio", lines: &[(224, 158), (169, 128)], names: &[(169, "PT.06")] },
];

static ORIN_COMPATS: &[&str] = &[
    "nvidia,p3737-0000+p3701-0000",
    "nvidia,p3737-0000+p3701-0004",
];

static XAVIER_NX_COMPATS: &[&str] = &[
    "nvidia,p3509-0000+p3668-0000",
    "nvidia,p3509-0000+p3668-0001",
    "nvidia,p3449-0000+p3668-0000",
    "nvidia,p3449-0000+p3668-0001",
    "nvidia,p3449-0000+p3668-0003",
];

/// Determines the Jetson model from the device tree.
///
/// Inside a container the device tree is usually not mounted, so the
/// `JETSON_MODEL_NAME` environment variable (`JETSON_ORIN` or `JETSON_NX`)
/// is honored as a fallback.
pub fn detect_model() -> Result<Model> {
    let compatible_path = "/proc/device-tree/compatible";

    if let Ok(contents) = fs::read_to_string(compatible_path) {
        let compats: Vec<&str> = contents.split('\0').collect();
        if ORIN_COMPATS.iter().any(|c| compats.contains(c)) {
            return Ok(Model::Orin);
        }
        if XAVIER_NX_COMPATS.iter().any(|c| compats.contains(c)) {
            return Ok(Model::XavierNx);
        }
    }

    if let Ok(name) = env::var("JETSON_MODEL_NAME") {
        match name.trim() {
            "JETSON_ORIN" => return Ok(Model::Orin),
            "JETSON_NX" => return Ok(Model::XavierNx),
            other => {
                log::warn!("environment variable JETSON_MODEL_NAME={} is invalid", other);
            }
        }
    }

    Err(Error::UnknownModel)
}

/// A header pin resolved against the running kernel.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    /// Physical pin number on the 40-pin header.
    pub channel: u32,
    /// Sysfs directory of the owning GPIO controller.
    pub chip_dir: String,
    /// Global Linux GPIO number, written to `export`/`unexport`.
    pub global_gpio: u32,
    /// Name of the exported line under `/sys/class/gpio`.
    pub name: String,
}

fn defs(model: Model) -> &'static [PinDef] {
    match model {
        Model::Orin => ORIN_PIN_DEFS,
        Model::XavierNx => XAVIER_NX_PIN_DEFS,
    }
}

fn pin_def(model: Model, channel: u32) -> Option<&'static PinDef> {
    defs(model).iter().find(|def| def.board == channel)
}

fn read_number(path: &str) -> Result<u32> {
    let contents = fs::read_to_string(path).map_err(|e| Error::sysfs(path, e))?;
    contents.trim().parse().map_err(|e| {
        Error::sysfs(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{}", e)),
        )
    })
}

/// Finds a GPIO controller's sysfs directory and reads its base and ngpio.
fn find_chip(chip: &'static str) -> Result<(String, u32, u32)> {
    let sysfs_prefixes = ["/sys/devices/", "/sys/devices/platform/"];

    for prefix in sysfs_prefixes {
        let chip_dir = format!("{}{}", prefix, chip);
        if !Path::new(&chip_dir).exists() {
            continue;
        }

        let gpio_dir = format!("{}/gpio", chip_dir);
        let entries = fs::read_dir(&gpio_dir).map_err(|e| Error::sysfs(&gpio_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::sysfs(&gpio_dir, e))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.starts_with("gpiochip") {
                continue;
            }

            let base = read_number(&format!("{}/{}/base", gpio_dir, name))?;
            let ngpio = read_number(&format!("{}/{}/ngpio", gpio_dir, name))?;
            return Ok((chip_dir, base, ngpio));
        }
    }

    Err(Error::MissingChip(chip))
}

/// Resolves a BOARD-mode pin number to its global GPIO number and exported
/// sysfs name on the running kernel.
pub fn channel_info(model: Model, channel: u32) -> Result<ChannelInfo> {
    let def = pin_def(model, channel).ok_or(Error::UnknownChannel(channel))?;
    let (chip_dir, base, ngpio) = find_chip(def.chip)?;

    let line = def
        .lines
        .iter()
        .find(|(n, _)| *n == ngpio)
        .map(|(_, line)| *line)
        .ok_or(Error::UnknownChannel(channel))?;
    let global_gpio = base + line;

    let name = def
        .names
        .iter()
        .find(|(n, _)| *n == ngpio)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("gpio{}", global_gpio));

    Ok(ChannelInfo {
        channel,
        chip_dir,
        global_gpio,
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_relay_pin_is_mapped_on_all_models() {
        for model in [Model::Orin, Model::XavierNx] {
            assert!(pin_def(model, 7).is_some(), "pin 7 missing for {:?}", model);
        }
    }

    #[test]
    fn power_and_ground_pins_are_not_gpio() {
        for channel in [1, 2, 4, 6, 9, 17, 20, 25, 30, 34, 39] {
            assert!(pin_def(Model::Orin, channel).is_none());
            assert!(pin_def(Model::XavierNx, channel).is_none());
        }
    }

    #[test]
    fn board_numbers_are_unique() {
        for model in [Model::Orin, Model::XavierNx] {
            let mut boards: Vec<u32> = defs(model).iter().map(|d| d.board).collect();
            boards.sort_unstable();
            boards.dedup();
            assert_eq!(boards.len(), defs(model).len());
        }
    }

    #[test]
    fn names_only_reference_declared_kernel_generations() {
        for model in [Model::Orin, Model::XavierNx] {
            for def in defs(model) {
                assert!(!def.lines.is_empty());
                for (ngpio, _) in def.names {
                    assert!(
                        def.lines.iter().any(|(n, _)| n == ngpio),
                        "pin {} names a generation without a line entry",
                        def.board
                    );
                }
            }
        }
    }
}
