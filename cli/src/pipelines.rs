use crate::templates;
use clap::ValueEnum;
use std::sync::Arc;
use troupe_core::{CompletionClient, Invocable, Sequential, Unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PipelineKind {
    #[value(help = "One assistant unit")]
    Ask,
    #[value(help = "Coordinator delegating to Researcher and Summariser")]
    Research,
    #[value(help = "Outline, Writer and Editor in sequence")]
    Blog,
}

impl PipelineKind {
    pub fn result_key(self) -> &'static str {
        match self {
            PipelineKind::Ask => "answer",
            PipelineKind::Research => "report",
            PipelineKind::Blog => "final_blog",
        }
    }
}

pub fn build(kind: PipelineKind, client: &CompletionClient) -> Arc<dyn Invocable> {
    match kind {
        PipelineKind::Ask => ask(client),
        PipelineKind::Research => research(client),
        PipelineKind::Blog => blog(client),
    }
}

fn ask(client: &CompletionClient) -> Arc<dyn Invocable> {
    Arc::new(
        Unit::new("Assistant", client.clone())
            .with_description("Answers a single question")
            .with_instruction(templates::ASSISTANT)
            .with_output_key(PipelineKind::Ask.result_key()),
    )
}

fn research(client: &CompletionClient) -> Arc<dyn Invocable> {
    let researcher = Unit::new("Researcher", client.clone())
        .with_description("Researches a focused request and returns the key facts")
        .with_instruction(templates::RESEARCHER)
        .with_output_key("research_findings");

    let summariser = Unit::new("Summariser", client.clone())
        .with_description("Condenses research notes into a short summary")
        .with_instruction(templates::SUMMARISER)
        .with_output_key("summary");

    Arc::new(
        Unit::new("Coordinator", client.clone())
            .with_description("Plans the research and writes the report")
            .with_instruction(templates::COORDINATOR)
            .with_unit_tool(Arc::new(researcher))
            .with_unit_tool(Arc::new(summariser))
            .with_output_key(PipelineKind::Research.result_key()),
    )
}

fn blog(client: &CompletionClient) -> Arc<dyn Invocable> {
    let outline = Unit::new("OutlineAgent", client.clone())
        .with_instruction(templates::OUTLINE)
        .with_output_key("blog_outline");
    let writer = Unit::new("WriterAgent", client.clone())
        .with_instruction(templates::WRITER)
        .with_output_key("blog_draft");
    let editor = Unit::new("EditorAgent", client.clone())
        .with_instruction(templates::EDITOR)
        .with_output_key(PipelineKind::Blog.result_key());

    Arc::new(
        Sequential::new(
            "BlogPipeline",
            vec![Arc::new(outline), Arc::new(writer), Arc::new(editor)],
        )
        .with_description("Outlines, writes and edits a blog post"),
    )
}
