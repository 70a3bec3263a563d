//! The smoke test itself: pick a device, build, run, verify.
//!
//! Progress goes to `out` as one continuous transcript; diagnostics go to the
//! logger. Every device resource is owned by this call frame and released on
//! return, whichever way the run ends.

use crate::backend::{BufferAccess, BuildOutcome, ComputeBackend, ComputeSession, WorkSize};
use crate::error::SmokeError;
use crate::kernel::{ENTRY_POINT, SUM_BUFFERS_SOURCE, TOTAL_SIZE, resolve_local_size};
use crate::select::{check_index, read_device_index};
use crate::verify::{input_values, verify};

use anyhow::Result;
use std::io::{BufRead, Write};

/// How many results are echoed after a successful verification.
const SHOWN_RESULTS: usize = 10;

/// Knobs of a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Platform index.
    pub platform: usize,
    /// Device index; `None` prompts on the input stream.
    pub device: Option<usize>,
    /// Work-group size; `None` picks one that fits the device.
    pub local_work_size: Option<usize>,
}

/// Runs the smoke test and returns the verified kernel output.
pub fn run<B, R, W>(backend: &B, opts: &RunOptions, input: &mut R, out: &mut W) -> Result<Vec<f64>>
where
    B: ComputeBackend,
    R: BufRead,
    W: Write,
{
    let platforms = backend.platforms()?;
    if platforms.is_empty() {
        writeln!(out, " No platforms found. Check OpenCL installation!")?;
        return Err(SmokeError::NoPlatforms.into());
    }

    let platform = check_index("platform", opts.platform, platforms.len())?;
    let platform_name = &platforms[platform];
    writeln!(out, "Using platform: {}", platform_name)?;

    write!(out, "Getting devices...")?;
    out.flush()?;
    let devices = backend.devices(platform)?;
    if devices.is_empty() {
        writeln!(out, " No devices found. Check OpenCL installation!")?;
        return Err(SmokeError::NoDevices {
            platform: platform_name.clone(),
        }
        .into());
    }
    writeln!(out, "Done!")?;

    for (i, device) in devices.iter().enumerate() {
        writeln!(out, "Device {} - {}", i, device.name)?;
    }

    let device = match opts.device {
        Some(index) => check_index("device", index, devices.len())?,
        None => {
            write!(out, "Select your device id: ")?;
            out.flush()?;
            read_device_index(input, devices.len())?
        }
    };
    writeln!(out, "Using device: {}", devices[device].name)?;

    write!(out, "Creating context...")?;
    out.flush()?;
    let session = backend.open_session(platform, device)?;
    writeln!(out, "Done!")?;

    let info = session.device();
    if !info.supports_fp64 {
        log::warn!(
            "{} does not advertise cl_khr_fp64; the double-precision kernel may not build",
            info.name
        );
    }

    write!(out, "Building kernel...")?;
    out.flush()?;
    let kernel = match session.build_kernel(SUM_BUFFERS_SOURCE, ENTRY_POINT)? {
        BuildOutcome::Built(kernel) => kernel,
        BuildOutcome::Failed { log } => {
            writeln!(out, "Error building: {}", log)?;
            return Err(SmokeError::Build { log }.into());
        }
    };
    writeln!(out, "Done!")?;

    let max_local = info
        .max_work_group_size
        .min(session.kernel_work_group_size(&kernel));
    let work = WorkSize {
        global: TOTAL_SIZE,
        local: resolve_local_size(TOTAL_SIZE, opts.local_work_size, max_local)?,
    };
    log::debug!("Dispatch geometry: global {}, local {}", work.global, work.local);

    let mut numbers = input_values(TOTAL_SIZE);

    write!(out, "Allocating buffers...")?;
    let mut buffer_a = session.create_buffer(BufferAccess::ReadOnly, TOTAL_SIZE)?;
    write!(out, "A done! ")?;
    let mut buffer_b = session.create_buffer(BufferAccess::ReadOnly, TOTAL_SIZE)?;
    write!(out, "B done! ")?;
    let mut buffer_c = session.create_buffer(BufferAccess::WriteOnly, TOTAL_SIZE)?;
    writeln!(out, "Done!")?;

    write!(out, "Running...")?;
    out.flush()?;
    session.write_buffer(&mut buffer_a, &numbers)?;
    session.write_buffer(&mut buffer_b, &numbers)?;
    session.dispatch(&kernel, &buffer_a, &buffer_b, &mut buffer_c, work)?;
    writeln!(out, "Done!")?;

    write!(out, "Verifying results...")?;
    session.read_buffer(&buffer_c, &mut numbers)?;
    if let Err(mismatch) = verify(&numbers) {
        if let SmokeError::Mismatch {
            index,
            actual,
            expected,
        } = &mismatch
        {
            writeln!(
                out,
                "Verification failed! result #{}, {} != {} (expected).",
                index, actual, expected
            )?;
        }
        return Err(mismatch.into());
    }

    writeln!(out, "Good! First {} numbers: ", SHOWN_RESULTS)?;
    for value in numbers.iter().take(SHOWN_RESULTS) {
        writeln!(out, "{}", value)?;
    }
    Ok(numbers)
}

/// Lists every platform and its devices.
pub fn list_devices<B: ComputeBackend, W: Write>(backend: &B, out: &mut W) -> Result<()> {
    writeln!(out, "Available OpenCL Platforms and Devices:")?;
    let platforms = backend.platforms()?;
    if platforms.is_empty() {
        writeln!(out, "  No OpenCL platforms found.")?;
        return Ok(());
    }

    for (plat_idx, plat_name) in platforms.iter().enumerate() {
        writeln!(out, "\nPlatform {}: {}", plat_idx, plat_name)?;

        match backend.devices(plat_idx) {
            Ok(devices) if devices.is_empty() => {
                writeln!(out, "  No devices found on this platform.")?;
            }
            Ok(devices) => {
                for (dev_idx, device) in devices.iter().enumerate() {
                    writeln!(
                        out,
                        "  Device {}: {} ({}) - Memory: {} MB, max work-group size {}{}",
                        dev_idx,
                        device.name,
                        device.vendor,
                        device.global_mem_size / (1024 * 1024),
                        device.max_work_group_size,
                        if device.supports_fp64 { "" } else { ", no fp64" }
                    )?;
                }
            }
            Err(e) => {
                writeln!(out, "  Error getting devices for this platform: {:#}", e)?;
            }
        }
    }
    Ok(())
}
