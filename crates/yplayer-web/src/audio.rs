use web_sys::{AnalyserNode, AudioContext, AudioContextState, HtmlMediaElement, MediaElementAudioSourceNode};
use yplayer_core::{AnalysisGraph, AudioBackend, VisualizerError, VisualizerResult};

use crate::js_message;

/// Builds Web Audio graphs: media element -> analyser -> speakers
#[derive(Clone, Copy, Debug, Default)]
pub struct WebAudioBackend;

pub struct WebAnalysisGraph {
    context: AudioContext,
    analyser: AnalyserNode,
    source: MediaElementAudioSourceNode,
    closed: bool,
}

impl AudioBackend for WebAudioBackend {
    type Media = HtmlMediaElement;
    type Graph = WebAnalysisGraph;

    fn create_graph(&self, media: &HtmlMediaElement, fft_size: u32) -> VisualizerResult<WebAnalysisGraph> {
        let context = AudioContext::new().map_err(|e| VisualizerError::Unsupported(js_message(&e)))?;
        match connect(&context, media, fft_size) {
            Ok((analyser, source)) => Ok(WebAnalysisGraph {
                context,
                analyser,
                source,
                closed: false,
            }),
            Err(e) => {
                // Don't leak a half-built context
                let _ = context.close();
                Err(e)
            }
        }
    }
}

fn connect(
    context: &AudioContext,
    media: &HtmlMediaElement,
    fft_size: u32,
) -> VisualizerResult<(AnalyserNode, MediaElementAudioSourceNode)> {
    let graph_err = |e: wasm_bindgen::JsValue| VisualizerError::Graph(js_message(&e));

    let analyser = context.create_analyser().map_err(graph_err)?;
    analyser.set_fft_size(fft_size);

    // Throws InvalidStateError when the element already feeds another context
    let source = context
        .create_media_element_source(media)
        .map_err(|e| VisualizerError::AlreadyTapped(js_message(&e)))?;

    source.connect_with_audio_node(&analyser).map_err(graph_err)?;
    // Without this hop the element goes silent
    analyser
        .connect_with_audio_node(&context.destination())
        .map_err(graph_err)?;
    Ok((analyser, source))
}

impl AnalysisGraph for WebAnalysisGraph {
    fn bucket_count(&self) -> usize {
        self.analyser.frequency_bin_count() as usize
    }

    fn frequency_data(&self, buffer: &mut [u8]) {
        self.analyser.get_byte_frequency_data(buffer);
    }

    fn resume(&self) {
        if self.context.state() == AudioContextState::Suspended {
            if let Err(e) = self.context.resume() {
                log::warn!("Could not resume audio context: {}", js_message(&e));
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.source.disconnect();
        let _ = self.analyser.disconnect();
        if let Err(e) = self.context.close() {
            log::warn!("Audio context close failed: {}", js_message(&e));
        }
    }
}
