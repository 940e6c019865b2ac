//! Device pipeline assembled from [`AppConfig`].
//!
//! Without result rendering, captured pictures go to both `InferenceFlow` and
//! `EmbedFlow`, and the embed stage pairs each picture with the latest
//! result. With `device.render_result` the picture travels with its result
//! through `OverlayFlow`, which paints it before the embed stage.

use super::{EmbedFlow, InferenceEngine, InferenceFlow, OverlayFlow, PictureEncoder};
use crate::buffer::MediaBuffer;
use crate::config::AppConfig;
use crate::decode::ModelRegistry;
use crate::error::Result;
use crate::pipeline::{Graph, NodeId};
use std::sync::Arc;

/// Node ids of an installed device pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePipeline {
    pub inference: NodeId,
    pub overlay: Option<NodeId>,
    /// Output slot 0 carries the encoded pictures for the UVC link.
    pub embed: NodeId,
}

impl DevicePipeline {
    /// Install and wire the device flows into `graph`.
    pub fn install(
        graph: &Graph,
        config: &AppConfig,
        registry: Arc<ModelRegistry>,
        engine: impl InferenceEngine + 'static,
        encoder: impl PictureEncoder + 'static,
    ) -> Result<Self> {
        let template = config.device.model.header_template()?;
        let render = config.device.render_result;
        let queues = &config.queues;

        let inference = graph.install(
            "inference",
            InferenceFlow::new(engine)
                .hold_picture(render)
                .slot_map(queues.picture_depth),
        )?;
        let embed = graph.install(
            "embed",
            EmbedFlow::new(template, encoder)
                .render_mode(render)
                .slot_map(queues.picture_depth, queues.result_depth),
        )?;

        let overlay = if render {
            let overlay = graph.install("overlay", OverlayFlow::new(registry, template).slot_map())?;
            graph.connect(inference, 0, overlay, 0)?;
            graph.connect(overlay, 0, embed, 0)?;
            Some(overlay)
        } else {
            graph.connect(inference, 0, embed, 1)?;
            None
        };

        tracing::info!(
            "Device pipeline for {} installed (render_result: {})",
            config.device.model,
            render
        );
        Ok(Self {
            inference,
            overlay,
            embed,
        })
    }

    /// Feed one captured picture.
    pub fn send(&self, graph: &Graph, picture: MediaBuffer) -> Result<()> {
        if self.overlay.is_none() {
            graph.send(self.embed, 0, picture.clone())?;
        }
        graph.send(self.inference, 0, picture)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelSelection;
    use crate::error::Error;
    use crate::pipeline::nodes::JpegSpliceEncoder;
    use crate::sideband::InferencePayload;
    use crate::types::Geometry;

    fn no_result(_: &MediaBuffer) -> anyhow::Result<Option<InferencePayload>> {
        Ok(None)
    }

    fn install(config: &AppConfig) -> (Graph, Result<DevicePipeline>) {
        let graph = Graph::new();
        let pipeline = DevicePipeline::install(
            &graph,
            config,
            Arc::new(ModelRegistry::with_builtin()),
            no_result,
            JpegSpliceEncoder,
        );
        (graph, pipeline)
    }

    #[test]
    fn test_pass_through_wiring() {
        let (graph, pipeline) = install(&AppConfig::default());
        let pipeline = pipeline.unwrap();
        assert!(pipeline.overlay.is_none());
        let edges = graph.topology().edges;
        assert_eq!(edges.len(), 1);
        assert_eq!(
            (edges[0].source, edges[0].dest, edges[0].dest_slot),
            (pipeline.inference, pipeline.embed, 1)
        );
        graph.shutdown();
    }

    #[test]
    fn test_render_result_inserts_overlay() {
        let mut config = AppConfig::default();
        config.device.render_result = true;
        let (graph, pipeline) = install(&config);
        let pipeline = pipeline.unwrap();
        let overlay = pipeline.overlay.unwrap();
        let edges: Vec<(NodeId, NodeId)> = graph
            .topology()
            .edges
            .iter()
            .map(|e| (e.source, e.dest))
            .collect();
        assert_eq!(
            edges,
            vec![(pipeline.inference, overlay), (overlay, pipeline.embed)]
        );
        graph.shutdown();
    }

    #[test]
    fn test_model_name_too_long_for_header() {
        let mut config = AppConfig::default();
        config.device.model =
            ModelSelection::new(format!("rockx_{}", "x".repeat(40)), Geometry::new(1, 1));
        let (graph, pipeline) = install(&config);
        assert!(matches!(pipeline, Err(Error::Config(_))));
        assert!(graph.topology().nodes.is_empty());
    }
}
