//! Lowering of input/output settings into ffmpeg's positional argument grammar.
//!
//! Everything here is pure: the same settings always produce the same
//! tokens. Options that apply to an input precede its `-i`; options that
//! apply to an output precede its destination.

use super::types::{AudioSettings, Filter, InputSettings, OutputSettings, Track, VideoSettings};

/// Joins a filter chain into a single graph string.
pub fn filter_graph(filters: &[Filter]) -> String {
    filters
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn push_option(args: &mut Vec<String>, flag: &str, value: impl ToString) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

/// Tokens for one input, ending with `-i <source>`.
pub fn lower_input(settings: &InputSettings, source: &str) -> Vec<String> {
    let mut args = settings.extra_options.clone();

    if let Some(format) = &settings.format {
        push_option(&mut args, "-f", format);
    }
    if let Some(fps) = settings.fps {
        push_option(&mut args, "-r", fps);
    }
    if settings.native {
        args.push("-re".to_string());
    }
    if let Some(seek) = &settings.seek {
        push_option(&mut args, "-ss", seek);
    }
    if settings.looped {
        push_option(&mut args, "-loop", 1);
    }

    push_option(&mut args, "-i", source);
    args
}

/// Tokens for the audio block of an output.
pub fn lower_audio(audio: &Track<AudioSettings>) -> Vec<String> {
    let Track::Enabled(audio) = audio else {
        return vec!["-an".to_string()];
    };

    let mut args = Vec::new();
    if let Some(codec) = &audio.codec {
        push_option(&mut args, "-c:a", codec);
    }
    if let Some(bitrate) = &audio.bitrate {
        push_option(&mut args, "-b:a", bitrate);
    }
    if let Some(channels) = audio.channels {
        push_option(&mut args, "-ac", channels);
    }
    if let Some(frequency) = audio.frequency {
        push_option(&mut args, "-ar", frequency);
    }
    if let Some(quality) = audio.quality {
        push_option(&mut args, "-q:a", quality);
    }
    if !audio.filters.is_empty() {
        push_option(&mut args, "-af", filter_graph(&audio.filters));
    }
    args
}

/// Tokens for the video block of an output.
///
/// A size is applied as a `scale` filter after any caller filters.
pub fn lower_video(video: &Track<VideoSettings>) -> Vec<String> {
    let Track::Enabled(video) = video else {
        return vec!["-vn".to_string()];
    };

    let mut args = Vec::new();
    if let Some(codec) = &video.codec {
        push_option(&mut args, "-c:v", codec);
    }
    if let Some(bitrate) = &video.bitrate {
        push_option(&mut args, "-b:v", bitrate);
    }
    if let Some(fps) = video.fps {
        push_option(&mut args, "-r", fps);
    }
    if let Some(frames) = video.frames {
        push_option(&mut args, "-frames:v", frames);
    }

    let mut filters = video.filters.clone();
    if let Some(size) = &video.size {
        filters.push(size.scale_filter());
    }
    if !filters.is_empty() {
        push_option(&mut args, "-vf", filter_graph(&filters));
    }
    args
}

/// Tokens for one output, ending with its destination.
pub fn lower_output(settings: &OutputSettings, destination: &str) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(format) = &settings.format {
        push_option(&mut args, "-f", format);
    }
    if let Some(seek) = &settings.seek {
        push_option(&mut args, "-ss", seek);
    }
    if let Some(duration) = &settings.duration {
        push_option(&mut args, "-t", duration);
    }

    args.extend(lower_audio(&settings.audio));
    args.extend(lower_video(&settings.video));
    args.extend(settings.extra_options.iter().cloned());

    args.push(destination.to_string());
    args
}
