//! Passthrough copy for fonts and video.

use crate::build::{BuildContext, Stage, StageError, StageOutput};
use crate::config::{CopyConfig, SiteConfig};
use std::fs;

/// Copies a file set into an output directory, keeping the relative layout.
pub struct CopyStage {
    name: &'static str,
    description: &'static str,
    select: fn(&SiteConfig) -> &CopyConfig,
}

impl CopyStage {
    /// The `fonts` task.
    pub fn fonts() -> Self {
        Self { name: "fonts", description: "Copy web fonts", select: |c| &c.fonts }
    }

    /// The `video` task.
    pub fn video() -> Self {
        Self { name: "video", description: "Copy video files", select: |c| &c.video }
    }
}

impl Stage for CopyStage {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageOutput, StageError> {
        let config = (self.select)(ctx.config());
        let out_dir = ctx.resolve_path(&config.out);

        let mut output = StageOutput::new();
        for file in config.sources.resolve(ctx.project_root())? {
            let dest = out_dir.join(&file.relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| StageError::io(parent, e))?;
            }
            fs::copy(&file.path, &dest).map_err(|e| StageError::io(&file.path, e))?;
            output.wrote(dest);
        }
        Ok(output)
    }
}
