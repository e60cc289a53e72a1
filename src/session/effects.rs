use std::io::Write;
use std::sync::mpsc::Sender;

use anyhow::{Context, Result};
use tracing::warn;

use crate::api::ConversionResponse;
use crate::document::render_preview;
use crate::export::{Compiler, document_markup};
use crate::session::model::Status;
use crate::session::{Message, Model, Session};

impl Session {
    pub(super) fn handle_side_effects(&self, model: &mut Model, tx: &Sender<Message>) {
        let Some(dispatch) = model.take_dispatch() else {
            return;
        };
        crate::perf::log_event(
            "session.dispatch",
            format!(
                "generation={} provider={} count={}",
                dispatch.generation,
                self.provider.name(),
                dispatch.batch.len()
            ),
        );

        let provider = self.provider.clone();
        let tx = tx.clone();
        // The worker only reports back; whether its result still matters is
        // decided by the update function.
        std::thread::spawn(move || {
            let outcome = provider.request(&dispatch.batch);
            let _ = tx.send(Message::BatchFinished {
                generation: dispatch.generation,
                outcome,
            });
        });
    }

    /// Write the settled model to stdout and export it if requested.
    pub(super) fn emit(&self, model: &Model) -> Result<()> {
        self.write_output(model)?;
        self.export(model)
    }

    /// Like [`Session::emit`], but a failed export is reported and the
    /// session carries on with the next edit.
    pub(super) fn emit_watched(&self, model: &Model) -> Result<()> {
        self.write_output(model)?;
        if let Err(err) = self.export(model) {
            warn!(generation = model.generation, error = %err, "export failed");
            crate::perf::log_event("session.export_failed", err.to_string());
            eprintln!("[warn] export failed: {err:#}");
        }
        Ok(())
    }

    fn write_output(&self, model: &Model) -> Result<()> {
        let mut out = std::io::stdout().lock();
        if self.json_output {
            let response = ConversionResponse::from_segments(&model.rendered);
            serde_json::to_writer(&mut out, &response).context("Failed to write JSON output")?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", render_preview(&model.rendered))?;
        }
        out.flush()?;
        drop(out);

        if let Status::Failed(reason) = &model.status {
            eprintln!("[warn] conversion failed, showing fallback output: {reason}");
        }
        if !model.dropped.is_empty() {
            eprintln!(
                "[warn] {} instruction(s) could not be converted: {}",
                model.dropped.len(),
                model.dropped.join(", ")
            );
        }
        Ok(())
    }

    fn export(&self, model: &Model) -> Result<()> {
        let Some(export) = &self.export else {
            return Ok(());
        };
        let markup = document_markup(&model.rendered);
        let name = export.path.to_string_lossy();
        let pdf = export.compilers.compile(&markup, &name)?;
        std::fs::write(&export.path, pdf)
            .with_context(|| format!("Failed to write {}", export.path.display()))?;
        tracing::info!(path = %export.path.display(), "exported PDF");
        Ok(())
    }
}
