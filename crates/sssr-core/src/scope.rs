//! Scoped recording of transient resources.

use crate::commands::{Command, CommandList, TextureDesc, TextureRef, TransientId};

/// Records commands inside a debug group and owns the transients it acquires.
///
/// Dropping the scope records a `Release` for every transient it acquired,
/// in reverse order, followed by the closing `PopDebugGroup`. Every exit
/// path of a stage therefore releases exactly what it acquired.
pub struct ResourceScope<'a> {
    list: &'a mut CommandList,
    owned: Vec<TransientId>,
}

impl<'a> ResourceScope<'a> {
    pub fn new(list: &'a mut CommandList, label: &'static str) -> Self {
        log::trace!("recording stage '{label}'");
        list.push(Command::PushDebugGroup(label));
        Self {
            list,
            owned: Vec::new(),
        }
    }

    /// Acquires a pool texture released when this scope ends.
    pub fn acquire(&mut self, desc: TextureDesc) -> TextureRef {
        let id = self.list.allocate_transient();
        self.list.push(Command::Acquire { id, desc });
        self.owned.push(id);
        TextureRef::Transient(id)
    }

    /// Opens a nested scope; its transients are released before this one continues.
    pub fn stage(&mut self, label: &'static str) -> ResourceScope<'_> {
        ResourceScope::new(self.list, label)
    }

    pub fn record(&mut self, command: Command) {
        self.list.push(command);
    }

    pub fn list(&self) -> &CommandList {
        &*self.list
    }
}

impl Drop for ResourceScope<'_> {
    fn drop(&mut self) {
        while let Some(id) = self.owned.pop() {
            self.list.push(Command::Release { id });
        }
        self.list.push(Command::PopDebugGroup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{PersistentLayout, TexelFormat};
    use crate::config::{DebugPass, SsrConfig};
    use crate::extent::{Extent, FrameExtents};
    use crate::params::FrameParameters;
    use crate::uniforms::FrameUniforms;
    use bytemuck::Zeroable;

    fn list() -> CommandList {
        let params = FrameParameters::from_config(&SsrConfig::default());
        let extents = FrameExtents::new(Extent::new(16, 16), &params.flags);
        let persistent = PersistentLayout::for_extents(&extents);
        CommandList::new(FrameUniforms::zeroed(), extents, persistent, DebugPass::Combine)
    }

    fn desc(label: &'static str) -> TextureDesc {
        TextureDesc::new(label, Extent::new(8, 8), TexelFormat::R32Float)
    }

    #[test]
    fn test_nested_scopes_release_in_reverse() {
        let mut list = list();
        {
            let mut frame = ResourceScope::new(&mut list, "frame");
            let outer = frame.acquire(desc("outer"));
            {
                let mut stage = frame.stage("stage");
                stage.acquire(desc("a"));
                stage.acquire(desc("b"));
            }
            frame.record(Command::Copy {
                source: outer,
                destination: outer,
            });
        }
        list.validate().unwrap();

        let releases: Vec<u32> = list
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::Release { id } => Some(id.0),
                _ => None,
            })
            .collect();
        assert_eq!(releases, vec![2, 1, 0]);
        assert_eq!(list.commands().last(), Some(&Command::PopDebugGroup));
    }

    #[test]
    fn test_early_return_still_releases() {
        fn stage_that_bails(list: &mut CommandList) -> Option<()> {
            let mut scope = ResourceScope::new(list, "bail");
            scope.acquire(desc("x"));
            let bail: Option<()> = None;
            bail?;
            scope.acquire(desc("never"));
            Some(())
        }

        let mut list = list();
        assert!(stage_that_bails(&mut list).is_none());
        list.validate().unwrap();
        assert_eq!(list.commands().len(), 4);
    }
}
