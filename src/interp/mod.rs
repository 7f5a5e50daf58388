//! Track-event interpreter
//!
//! The central state machine: walks one track's opcode stream through a
//! [`SequenceFormat`], accounting time and resolving loops and jumps. The
//! same decode path runs under three [`ReadMode`]s; only emission and the
//! infinite-loop policy differ per mode, so the UI model, the measured
//! duration and the exported events agree by construction.
//!
//! Interpretation never fails: malformed data (an opcode outside the
//! recognized set, a read past the region) truncates the track with a
//! synthesized end-of-track, and a forced infinite-loop termination is an
//! informational condition, not an error.

use crate::bytes::ByteSource;
use crate::config::InterpConfig;
use crate::format::{SequenceFormat, StepControl, TrackCursor};
use crate::model::{Event, LoopFrame, TimedEvent, TrackState};
use crate::ChipseqError;

/// Which side effects an interpretation pass performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Collect every event for inspection; stop at the first infinite loop
    /// and record it as an annotation.
    BuildModel,
    /// Discard events, keep timing; unroll infinite loops up to the
    /// configured bound.
    MeasureDuration,
    /// Collect events for export; identical loop policy to
    /// [`ReadMode::MeasureDuration`].
    EmitOutput,
}

/// Everything one pass over one track produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineResult {
    /// Decoded events in stream order (empty under `MeasureDuration`)
    pub events: Vec<TimedEvent>,
    /// Total elapsed ticks
    pub duration_ticks: u64,
    /// Whether the pass ended on malformed data rather than an explicit end
    pub truncated: bool,
    /// Infinite-loop body offset, when one was found
    pub loop_point: Option<usize>,
    /// One past the furthest byte the pass consumed
    pub end_offset: usize,
}

/// Why the main step loop finished.
enum Stop {
    Explicit,
    Truncated,
    LoopBound,
    AnnotatedLoop,
}

/// Interpret one track from `start_offset`.
///
/// A pure function of its arguments: re-running with identical inputs yields
/// an identical [`TimelineResult`], including cursor trajectory and event
/// order. `doc_base`/`doc_end` bound every read and jump.
pub fn interpret(
    format: &dyn SequenceFormat,
    source: &ByteSource,
    doc_base: usize,
    doc_end: usize,
    start_offset: usize,
    mode: ReadMode,
    cfg: &InterpConfig,
) -> TimelineResult {
    let emit = mode != ReadMode::MeasureDuration;
    let mut state = TrackState::new(start_offset);
    let mut events: Vec<TimedEvent> = Vec::new();
    let mut loop_point: Option<usize> = None;
    let mut end_offset = start_offset;
    // how many times the infinite-loop body has played
    let mut loop_plays: u32 = 1;
    let mut steps: usize = 0;

    let stop = 'pass: loop {
        if state.cursor >= doc_end {
            break Stop::Truncated;
        }
        steps += 1;
        if steps > cfg.max_steps {
            log::warn!(
                "step budget exhausted at {:#x}; stream makes no progress",
                state.cursor
            );
            break Stop::Truncated;
        }

        let begin = state.cursor;
        let step = {
            let mut cur = TrackCursor::new(source, doc_base, doc_end, &mut state);
            format.step(&mut cur)
        };
        let step = match step {
            Ok(step) => step,
            Err(ChipseqError::UnrecognizedOpcode { opcode, offset }) => {
                log::debug!("unrecognized opcode {opcode:#04x} at {offset:#x}; truncating track");
                break Stop::Truncated;
            }
            Err(err) => {
                log::debug!("read failed at {begin:#x} ({err}); truncating track");
                break Stop::Truncated;
            }
        };

        state.add_time(step.ticks);
        end_offset = end_offset.max(state.cursor);
        if emit {
            for event in &step.events {
                events.push(TimedEvent::new(state.ticks, event.clone()));
            }
        }

        match step.control {
            StepControl::Continue => {}
            StepControl::LoopBegin { count } => {
                state.loop_stack.push(LoopFrame {
                    return_offset: state.cursor,
                    remaining: count,
                });
            }
            StepControl::LoopEnd => {
                match state.loop_stack.last_mut() {
                    Some(frame) => match frame.remaining {
                        Some(0) => {
                            state.loop_stack.pop();
                        }
                        Some(n) => {
                            frame.remaining = Some(n - 1);
                            state.cursor = frame.return_offset;
                        }
                        None => {
                            let target = frame.return_offset;
                            match resolve_infinite(
                                mode,
                                cfg,
                                &mut state,
                                &mut loop_point,
                                &mut loop_plays,
                                target,
                            ) {
                                LoopOutcome::Follow => {}
                                LoopOutcome::Stop(stop) => break 'pass stop,
                            }
                        }
                    },
                    None => {
                        // drivers ship tracks whose closing opcode has no
                        // matching open; skipping it matches their players
                        log::debug!("loop end with empty stack at {begin:#x}; ignored");
                    }
                }
            }
            StepControl::Jump { target } => {
                let distance = target.abs_diff(begin);
                if target < doc_base || target >= doc_end || distance > cfg.jump_tolerance {
                    log::debug!(
                        "jump from {begin:#x} to {target:#x} fails sanity bounds; truncating"
                    );
                    break Stop::Truncated;
                }
                if target <= begin {
                    match resolve_infinite(
                        mode,
                        cfg,
                        &mut state,
                        &mut loop_point,
                        &mut loop_plays,
                        target,
                    ) {
                        LoopOutcome::Follow => {}
                        LoopOutcome::Stop(stop) => break 'pass stop,
                    }
                } else {
                    state.cursor = target;
                }
            }
            StepControl::EndOfTrack => break Stop::Explicit,
        }
    };

    let truncated = matches!(stop, Stop::Truncated);
    match stop {
        Stop::Explicit => {}
        Stop::AnnotatedLoop => {
            if emit {
                if let Some(target) = loop_point {
                    events.push(TimedEvent::new(state.ticks, Event::LoopMarker { target }));
                }
                events.push(TimedEvent::new(state.ticks, Event::EndOfTrack));
            }
        }
        Stop::Truncated | Stop::LoopBound => {
            if emit {
                events.push(TimedEvent::new(state.ticks, Event::EndOfTrack));
            }
        }
    }

    TimelineResult {
        events,
        duration_ticks: state.ticks,
        truncated,
        loop_point,
        end_offset,
    }
}

enum LoopOutcome {
    Follow,
    Stop(Stop),
}

/// Apply the per-mode infinite-loop policy for a back-reference to `target`.
fn resolve_infinite(
    mode: ReadMode,
    cfg: &InterpConfig,
    state: &mut TrackState,
    loop_point: &mut Option<usize>,
    loop_plays: &mut u32,
    target: usize,
) -> LoopOutcome {
    // the sentinel is set once; later back-references count against the
    // same bound even when they resolve to a different offset
    let sentinel = *state.infinite_loop_at.get_or_insert(target);
    *loop_point = Some(sentinel);

    match mode {
        ReadMode::BuildModel => LoopOutcome::Stop(Stop::AnnotatedLoop),
        ReadMode::MeasureDuration | ReadMode::EmitOutput => {
            if *loop_plays < cfg.max_loop_expansions {
                *loop_plays += 1;
                state.cursor = sentinel;
                LoopOutcome::Follow
            } else {
                log::info!(
                    "infinite loop at {sentinel:#x} expanded {} times; forcing end of track",
                    cfg.max_loop_expansions
                );
                LoopOutcome::Stop(Stop::LoopBound)
            }
        }
    }
}
