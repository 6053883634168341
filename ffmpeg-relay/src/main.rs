use std::time::Instant;

use ffmpeg_relay::{AvInput, FfmpegEngine, MetaData};
use futures::StreamExt;
use media_relay::{
    CaptureConfig, CaptureSession, PlaybackPacer, SessionTask, StreamTime, audio_blocks,
};

const USAGE: &str = "usage: ffmpeg-relay [-f <format>] <input> [seconds] [config.json]\n       ffmpeg-relay --packets <input>";

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("media_relay", log::LevelFilter::Debug)
        .filter_module("ffmpeg_relay", log::LevelFilter::Debug)
        .init();
}

/// Raw packet mode: list the video packets without decoding.
fn list_packets(path: &str) -> anyhow::Result<()> {
    let mut input = AvInput::open(path)?;
    print!("{}", MetaData::read(&input));
    let total = input.count_video_packets()?;
    let mut count = 0;
    while let Some(packet) = input.next_video_packet()? {
        log::debug!("{}", packet);
        println!("(video pkt {}) pkt size: {}", count, packet.size());
        count += 1;
    }
    println!("no. packets: {} (counted {})", count, total);
    Ok(())
}

async fn capture(path: &str, format: Option<&str>, config: CaptureConfig) -> anyhow::Result<()> {
    if format.is_none() {
        println!("{}", ffmpeg_relay::probe(path)?);
    }

    let input = AvInput::new(path, format, None)?;
    let engine = FfmpegEngine::new(&input, &config)?;
    let mut session = CaptureSession::open(input, engine, &config)?;
    let info = session.info().clone();

    let video = session.take_video();
    let audio = session.take_audio().ok();
    let subtitle = session.take_subtitle();
    let started = Instant::now();
    let task = SessionTask::spawn(session);

    let video = tokio::spawn(async move {
        let Some(video) = video else {
            return (0, StreamTime::default());
        };
        let mut pacer = PlaybackPacer::new(video.time_base());
        let mut frames = video.into_stream();
        let mut count = 0u64;
        while let Some(frame) = frames.next().await {
            pacer.pace_async(frame.pts).await;
            log::debug!("{}", frame);
            count += 1;
        }
        (count, pacer.elapsed())
    });

    let audio = tokio::spawn(async move {
        match audio {
            Some(reader) => {
                audio_blocks(reader, 4096)
                    .fold(0usize, |total, block| async move { total + block.len() })
                    .await
            }
            None => 0,
        }
    });

    let subtitle = tokio::spawn(async move {
        let Some(subtitle) = subtitle else {
            return 0;
        };
        subtitle
            .into_stream()
            .fold(0usize, |count, event| async move {
                for text in event.texts() {
                    log::info!("subtitle @{:?}: {}", event.pts, text);
                }
                count + 1
            })
            .await
    });

    let (video, audio, subtitle) = tokio::try_join!(video, audio, subtitle)?;
    let report = task.join().await;

    let (frames, elapsed) = video;
    println!("video frames processed {} in {}", frames, elapsed);
    println!("audio samples processed {} at {} Hz", audio, info.sample_rate);
    println!("subtitle events processed {}", subtitle);
    println!("wall time {:.1?}", started.elapsed());
    match report {
        Ok(report) => {
            println!("{}", report);
            Ok(())
        }
        Err(e) if !e.is_fatal() => {
            log::warn!("finished with a track error: {}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    if let [flag, path] = args.as_slice() {
        if flag == "--packets" {
            ffmpeg_relay::init(false)?;
            return list_packets(path);
        }
    }

    // capture devices (v4l2, x11grab, ...) need their input format named
    let format = if args.len() > 2 && args[0] == "-f" {
        let format = args.remove(1);
        args.remove(0);
        Some(format)
    } else {
        None
    };

    let Some(path) = args.first() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };
    let mut config = match args.get(2) {
        Some(file) => CaptureConfig::from_file(file)?,
        None => CaptureConfig::default(),
    };
    if let Some(secs) = args.get(1) {
        let secs: u64 = secs
            .parse()
            .map_err(|e| anyhow::anyhow!("bad duration {:?}: {}", secs, e))?;
        config.duration_secs = Some(secs);
    }

    ffmpeg_relay::init(config.codec_warnings)?;
    capture(path, format.as_deref(), config).await
}
