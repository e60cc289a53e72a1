use tracing::{debug, warn};

use super::model::{InFlight, Model, Status};
use crate::convert::plan;
use crate::document::extract;
use crate::error::ServiceError;

/// All events that move a session forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// The document text changed
    Edit(String),
    /// The quiet period after the last edit has passed
    Reconcile,
    /// A provider batch came back
    BatchFinished {
        generation: u64,
        outcome: Result<Vec<String>, ServiceError>,
    },
    /// Stop the session
    Quit,
}

/// Pure state transition.
pub fn update(mut model: Model, msg: Message) -> Model {
    match msg {
        Message::Edit(source) => {
            if source == model.source && model.status != Status::Idle {
                return model;
            }
            model.source = source;
            model.generation += 1;
            // Any batch still out belongs to an older generation; its
            // result is discarded when it arrives.
            model.in_flight = None;
            model.status = Status::Waiting;
        }
        Message::Reconcile => {
            // One batch per generation; a settled generation needs none.
            let busy = matches!(
                model.status,
                Status::Converting { generation } if generation == model.generation
            );
            if busy || model.status == Status::Ready {
                return model;
            }
            let plan = plan(extract(&model.source), &model.cache);
            if plan.is_complete() {
                let reconciled = plan.into_reconciled();
                model.rendered = reconciled.segments;
                model.dropped = reconciled.dropped;
                model.status = Status::Ready;
                model.in_flight = None;
            } else {
                model.rendered = plan.segments().to_vec();
                model.status = Status::Converting {
                    generation: model.generation,
                };
                model.in_flight = Some(InFlight {
                    generation: model.generation,
                    plan,
                    dispatched: false,
                });
            }
        }
        Message::BatchFinished {
            generation,
            outcome,
        } => {
            let current = model
                .in_flight
                .as_ref()
                .is_some_and(|in_flight| in_flight.generation == generation)
                && generation == model.generation;
            if !current {
                debug!(
                    generation,
                    current = model.generation,
                    "discarding stale batch result"
                );
                crate::perf::log_event(
                    "session.stale",
                    format!("generation={generation} current={}", model.generation),
                );
                return model;
            }
            let Some(in_flight) = model.in_flight.take() else {
                return model;
            };
            let reconciled = match outcome {
                Ok(reply) => {
                    model.status = Status::Ready;
                    in_flight.plan.merge(reply, &mut model.cache)
                }
                Err(err) => {
                    warn!(generation, error = %err, "conversion batch failed");
                    model.status = Status::Failed(err.to_string());
                    in_flight.plan.degrade()
                }
            };
            model.rendered = reconciled.segments;
            model.dropped = reconciled.dropped;
        }
        Message::Quit => model.should_quit = true,
    }
    model
}
