//! Scripted walk through the tutorial: one synthetic glyph per label, every
//! stage, then a single prediction.

use std::{f32::consts::PI, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use client_core::{
    Point, TaskState, WorkflowController, WorkflowEvent, WorkflowFailure, WorkflowView,
};
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tracing::{debug, info};

/// Draws a line through the canvas centre whose angle depends on `index`, so
/// every label gets a distinguishable sample.
pub async fn draw_glyph(controller: &WorkflowController, index: usize, total: usize) {
    let canvas = &controller.settings().canvas;
    let (width, height) = (canvas.width as f32, canvas.height as f32);
    let (cx, cy) = (width / 2.0, height / 2.0);
    let radius = width.min(height) * 0.35;
    let angle = index as f32 * PI / total.max(1) as f32;
    let (dx, dy) = (radius * angle.cos(), radius * angle.sin());

    controller.clear_drawing().await;
    controller.begin_stroke(Point::new(cx - dx, cy - dy)).await;
    controller.extend_stroke(Point::new(cx, cy)).await;
    controller.extend_stroke(Point::new(cx + dx, cy + dy)).await;
    controller.end_stroke().await;
}

pub async fn run_tutorial(
    controller: &Arc<WorkflowController>,
    gate_timeout: Duration,
) -> Result<WorkflowView> {
    let mut events = controller.subscribe_events();
    let total = controller.snapshot().await.collection_total;

    for index in 0..total {
        draw_glyph(controller, index, total).await;
        if let TaskState::Failed(failure) = controller.submit_drawing().await? {
            bail!(failure);
        }
    }

    let stages = controller.snapshot().await.stage_count;
    for _ in 1..stages {
        let index = controller.next_stage().await?;
        debug!(index, "tutorial: viewed stage");
    }

    tokio::time::timeout(gate_timeout, wait_for_gate(controller, &mut events))
        .await
        .context("training did not finish in time")??;
    controller.proceed_to_prediction().await?;

    draw_glyph(controller, 0, total).await;
    match controller.request_prediction().await? {
        TaskState::Succeeded(result) => {
            info!(class = result.class_index, label = ?result.label, "tutorial: predicted");
        }
        TaskState::Failed(failure) => bail!(failure),
        TaskState::Pending | TaskState::Idle => bail!("prediction did not run"),
    }

    Ok(controller.snapshot().await)
}

async fn wait_for_gate(
    controller: &WorkflowController,
    events: &mut Receiver<WorkflowEvent>,
) -> Result<()> {
    if controller.snapshot().await.can_proceed_to_predict {
        return Ok(());
    }
    loop {
        match events.recv().await {
            Ok(WorkflowEvent::GateOpened) => return Ok(()),
            Ok(WorkflowEvent::Failure(
                failure @ (WorkflowFailure::TrainStart(_) | WorkflowFailure::TrainingFailed(_)),
            )) => bail!(failure),
            Ok(_) => {}
            Err(RecvError::Lagged(_)) => {
                if controller.snapshot().await.can_proceed_to_predict {
                    return Ok(());
                }
            }
            Err(RecvError::Closed) => bail!("workflow event stream closed"),
        }
    }
}
