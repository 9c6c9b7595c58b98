// rsa-capture
// Copyright (c) 2026 The rsa-capture Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-line collaborator for `rsa-capture-core`: header dump, averaged spectrum, and FM
//! demodulation to a WAV file. None of this is part of the core's tested contract — it's a thin
//! wiring layer over the reader and DSP pipeline.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use num_complex::Complex;
use rustfft::FftPlanner;

use rsa_capture_core::dsp::{design_fir, BandEdges, FmDemodulator, Mixer, PolyphaseResampler, PostProc};
use rsa_capture_core::reader;

#[derive(Parser)]
#[command(name = "rsa-capture", about = "Read and process Tektronix RSA306-class IF captures")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the decoded header records and a summary of the correction tables.
    Header { path: PathBuf },

    /// Print an averaged periodogram of the capture.
    Spectrum {
        path: PathBuf,
        #[arg(long, default_value_t = 4096)]
        block_size: usize,
    },

    /// Mix, resample, and FM-demodulate a station to a mono 16-bit WAV file.
    DemodFm {
        path: PathBuf,
        /// Frequency offset (Hz) of the station from the capture's IF center frequency.
        #[arg(long)]
        station_offset: f64,
        /// Peak frequency deviation of the FM signal, in Hz.
        #[arg(long, default_value_t = 75e3)]
        deviation: f64,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Header { path } => cmd_header(&path),
        Command::Spectrum { path, block_size } => cmd_spectrum(&path, block_size),
        Command::DemodFm { path, station_offset, deviation, output } => {
            cmd_demod_fm(&path, station_offset, deviation, &output)
        }
    }
}

fn cmd_header(path: &PathBuf) -> Result<(), Box<dyn Error>> {
    let capture = reader::open(path)?;
    let header = capture.header();

    println!("VersionInfo:");
    println!("  file_id:        {}", header.version_info.file_id);
    println!("  device_serial:  {}", header.version_info.device_serial);
    println!("  file_format:    {:?}", header.version_info.file_format_version);
    println!("  api_version:    {:?}", header.version_info.api_version);
    println!("  fx3_version:    {:?}", header.version_info.fx3_version);
    println!("  fpga_version:   {:?}", header.version_info.fpga_version);

    println!("InstrumentState:");
    println!("  reference_level: {} dBm", header.instrument_state.reference_level);
    println!("  center_frequency: {} Hz", header.instrument_state.center_frequency);
    println!("  temperature:     {} C", header.instrument_state.temperature);

    println!("DataFormat:");
    println!("  data_type:        {} bytes/sample", header.data_format.data_type);
    println!("  frame_size:       {} bytes", header.data_format.frame_size);
    println!("  sample_size:      {} samples/frame", header.data_format.sample_size);
    println!("  if_center_frequency: {} Hz", header.data_format.if_center_frequency);
    println!("  sample_rate:      {} Hz", header.data_format.sample_rate);
    println!("  bandwidth:        {} Hz", header.data_format.bandwidth);

    let cc = &header.channel_correction;
    println!("ChannelCorrection:");
    println!("  adc_scale:      {}", cc.adc_scale);
    println!("  path_delay:     {} s", cc.path_delay);
    println!("  table_entries:  {}", cc.table_entries);
    if let (Some(&lo), Some(&hi)) = (cc.freq_table.first(), cc.freq_table.last()) {
        println!("  freq_table:     {} Hz .. {} Hz", lo, hi);
    }

    Ok(())
}

fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| {
            0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (n.max(1) - 1).max(1) as f32).cos()
        })
        .collect()
}

fn cmd_spectrum(path: &PathBuf, block_size: usize) -> Result<(), Box<dyn Error>> {
    let mut capture = reader::open(path)?;
    let sample_rate = capture.header().data_format.sample_rate;

    let window = hann_window(block_size);
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(block_size);

    let mut accum = vec![0f64; block_size];
    let mut count = 0u64;

    for block in capture.read_blocks(block_size, false, false)? {
        let block = block?;
        let mut buf: Vec<Complex<f32>> = block
            .samples()
            .iter()
            .zip(window.iter())
            .map(|(&s, &w)| Complex::new(s as f32 * w, 0.0))
            .collect();
        fft.process(&mut buf);

        for (acc, c) in accum.iter_mut().zip(buf.iter()) {
            *acc += (c.norm() as f64).powi(2);
        }
        count += 1;
    }

    if count == 0 {
        return Err("capture produced no full-sized blocks to analyze".into());
    }

    for k in 0..block_size / 2 {
        let freq = k as f64 * sample_rate / block_size as f64;
        let power = accum[k] / count as f64;
        let db = 10.0 * power.max(1e-300).log10();
        println!("{freq:.1}\t{db:.2}");
    }

    Ok(())
}

fn reduce_fraction(mut p: u64, mut q: u64) -> (u64, u64) {
    fn gcd(a: u64, b: u64) -> u64 {
        if b == 0 {
            a
        }
        else {
            gcd(b, a % b)
        }
    }
    let g = gcd(p, q).max(1);
    p /= g;
    q /= g;
    (p, q)
}

fn cmd_demod_fm(
    path: &PathBuf,
    station_offset: f64,
    deviation: f64,
    output: &PathBuf,
) -> Result<(), Box<dyn Error>> {
    let mut capture = reader::open(path)?;
    let header = capture.header().clone();

    let fs1 = header.data_format.sample_rate;
    let fs2 = 224e3;
    let fs3 = 32e3;

    let block_size_1: usize = 1_050_000;
    let (p1, q1) = reduce_fraction((fs2 * 1e6) as u64, (fs1 * 1e6) as u64);
    let block_size_2 = ((block_size_1 as u64 * p1) / q1) as usize;
    let (p2, q2) = reduce_fraction((fs3 * 1e6) as u64, (fs2 * 1e6) as u64);
    let block_size_3 = ((block_size_2 as u64 * p2) / q2) as usize;

    let taps1 = design_fir(BandEdges::Single(75e3), BandEdges::Single(100e3), 60.0, fs1, true, false)?;
    let taps2 = design_fir(BandEdges::Single(15e3), BandEdges::Single(16e3), 60.0, fs2, true, false)?;

    let resampler1 = PolyphaseResampler::new(p1 as usize, q1 as usize, &taps1, block_size_1, block_size_2)?;
    let heterodyne = header.data_format.if_center_frequency - header.instrument_state.center_frequency
        + (header.instrument_state.center_frequency + station_offset);

    let mut mixer = Mixer::new(block_size_1, fs1, heterodyne, 0.0, PostProc::Resampler(resampler1))?;
    let mut demod = FmDemodulator::new(block_size_2, fs2, deviation, 1.0)?;
    let mut resampler2 = PolyphaseResampler::<f32>::new(p2 as usize, q2 as usize, &taps2, block_size_2, block_size_3)?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: fs3 as u32,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output, spec)?;

    let mut peak = 1e-9f32;
    let mut staged: Vec<f32> = Vec::new();

    for block in capture.read_blocks(block_size_1, false, false)? {
        let block = block?;
        if block.samples().len() != block_size_1 {
            break;
        }
        let real: Vec<f32> = block.samples().iter().map(|&s| s as f32).collect();

        let baseband = mixer.process(&real)?;
        let demodulated = demod.process(&baseband)?;
        let audio = resampler2.process(&demodulated)?;

        for &s in &audio {
            peak = peak.max(s.abs());
        }
        staged.extend(audio);
    }

    let scale = (i16::MAX as f32) / peak;
    for s in staged {
        writer.write_sample((s * scale) as i16)?;
    }
    writer.finalize()?;

    Ok(())
}
