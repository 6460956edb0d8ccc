/// Scope and variable management for the compiler.
///
/// A local's register is its position in `locals`, so every statement can
/// use `locals.len()` as the first free scratch register.

/// A local variable in the current function scope.
#[derive(Clone, Debug)]
pub struct LocalVarInfo {
    pub name: String,
    /// Register index.
    pub reg: u32,
}

/// Block scope tracking.
#[derive(Clone, Debug)]
pub struct BlockScope {
    /// Number of local variables when this block started.
    pub num_locals_on_entry: usize,
    /// Whether this block is a loop (for break).
    pub is_loop: bool,
    /// Break jump PCs to patch to the loop exit.
    pub break_jumps: Vec<usize>,
}

/// Manages scopes and local variables for a single function.
#[derive(Debug, Default)]
pub struct ScopeManager {
    pub locals: Vec<LocalVarInfo>,
    pub blocks: Vec<BlockScope>,
}

impl ScopeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_block(&mut self, is_loop: bool) {
        self.blocks.push(BlockScope {
            num_locals_on_entry: self.locals.len(),
            is_loop,
            break_jumps: Vec::new(),
        });
    }

    /// Leave the current block, dropping its locals. Returns the block so
    /// the caller can patch its break jumps.
    pub fn leave_block(&mut self) -> Option<BlockScope> {
        let block = self.blocks.pop()?;
        self.locals.truncate(block.num_locals_on_entry);
        Some(block)
    }

    /// Register a new local variable. Returns its register.
    pub fn add_local(&mut self, name: impl Into<String>) -> u32 {
        let reg = self.locals.len() as u32;
        self.locals.push(LocalVarInfo {
            name: name.into(),
            reg,
        });
        reg
    }

    /// Innermost declaration wins.
    pub fn resolve_local(&self, name: &str) -> Option<u32> {
        self.locals.iter().rev().find(|v| v.name == name).map(|v| v.reg)
    }

    /// First register free for scratch use.
    pub fn free_reg(&self) -> u32 {
        self.locals.len() as u32
    }

    /// Find the nearest enclosing loop block.
    pub fn find_loop_block(&mut self) -> Option<&mut BlockScope> {
        self.blocks.iter_mut().rev().find(|b| b.is_loop)
    }
}
