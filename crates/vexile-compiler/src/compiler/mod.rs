//! Single-pass compiler: AST → register bytecode with a randomized opcode map.
pub mod expr;
pub mod scope;

use crate::ast::{Block, Chunk, Expression, FunctionBody, FunctionName, IfClause, Statement};
use crate::error::CompileError;
use crate::opcode::{Instruction, OpCode, OpcodeMap, MAX_JUMP, MAX_OPERAND, MIN_JUMP};
use crate::proto::{CompiledUnit, ConstantPool, Proto};
use rand::Rng;
use scope::ScopeManager;
use tracing::{debug, trace};
use vexile_core::{CipherKey, CipherLayers, ObfuscationSettings, Tuning};

type CompileResult<T> = Result<T, CompileError>;

/// Knobs the bytecode compiler reads from the resolved settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Store string constants as ciphertext.
    pub encrypt_strings: bool,
    pub cipher: CipherLayers,
}

impl CompileOptions {
    pub fn new(settings: &ObfuscationSettings, tuning: &Tuning) -> Self {
        CompileOptions {
            encrypt_strings: settings.string_encryption,
            cipher: tuning.cipher,
        }
    }
}

/// Compile a chunk. A fresh opcode map is drawn from `rng` for every call.
pub fn compile<R: Rng + ?Sized>(
    chunk: &Chunk,
    options: &CompileOptions,
    rng: &mut R,
) -> CompileResult<CompiledUnit> {
    let opcode_map = OpcodeMap::generate(rng);
    let mut compiler = Compiler {
        rng,
        options: *options,
        constants: ConstantPool::new(),
        protos: Vec::new(),
        cur: FuncState::default(),
        enclosing: Vec::new(),
    };
    compiler.function("main", &[], true, &chunk.body)?;
    let unit = CompiledUnit {
        protos: compiler.protos,
        constants: compiler.constants,
        opcode_map,
    };
    debug!(
        protos = unit.protos.len(),
        instructions = unit.instruction_count(),
        constants = unit.constants.len(),
        "compiled chunk"
    );
    Ok(unit)
}

/// State for a single function being compiled.
#[derive(Debug, Default)]
struct FuncState {
    proto: Proto,
    scope: ScopeManager,
}

struct Compiler<'r, R: Rng + ?Sized> {
    rng: &'r mut R,
    options: CompileOptions,
    constants: ConstantPool,
    /// Finished prototypes; slots are reserved when a function starts.
    protos: Vec<Proto>,
    cur: FuncState,
    /// Functions lexically enclosing `cur`, outermost first.
    enclosing: Vec<FuncState>,
}

impl<R: Rng + ?Sized> Compiler<'_, R> {
    // ---- emission ----

    fn pc(&self) -> usize {
        self.cur.proto.code.len()
    }

    fn emit(&mut self, op: OpCode, a: u32, b: u32, c: u32) -> CompileResult<usize> {
        let inst = Instruction::abc(
            op,
            operand(a, "registers")?,
            operand(b, "operands")?,
            operand(c, "operands")?,
        );
        let stack = self.cur.proto.max_stack.max(inst.a.saturating_add(1));
        self.cur.proto.max_stack = stack;
        trace!(pc = self.pc(), %inst, "emit");
        Ok(self.cur.proto.emit(inst))
    }

    /// Emit a branch with a placeholder offset, to be patched later.
    fn emit_jump(&mut self, op: OpCode, a: u32, c: u32) -> CompileResult<usize> {
        let inst = Instruction::jump(op, operand(a, "registers")?, 0, operand(c, "operands")?);
        Ok(self.cur.proto.emit(inst))
    }

    /// Emit a branch to an already-known (backward) target.
    fn emit_jump_to(&mut self, op: OpCode, a: u32, c: u32, target: usize) -> CompileResult<usize> {
        let at = self.emit_jump(op, a, c)?;
        self.patch(at, target)?;
        Ok(at)
    }

    /// Point the branch at `at` to `target`: target = at + 1 + offset.
    fn patch(&mut self, at: usize, target: usize) -> CompileResult<()> {
        let offset = target as i64 - (at as i64 + 1);
        if offset < i64::from(MIN_JUMP) || offset > i64::from(MAX_JUMP) {
            return Err(CompileError::LimitExceeded {
                what: "jump offset",
                limit: MAX_JUMP as usize,
            });
        }
        self.cur.proto.code[at].set_offset(offset as i32);
        Ok(())
    }

    fn patch_here(&mut self, at: usize) -> CompileResult<()> {
        let here = self.pc();
        self.patch(at, here)
    }

    // ---- constants ----

    fn string_constant(&mut self, s: &str) -> u32 {
        let encrypt = self.options.encrypt_strings;
        let layers = self.options.cipher;
        let rng = &mut *self.rng;
        self.constants
            .add_string(s, || encrypt.then(|| CipherKey::generate(layers, rng)))
    }

    fn number_constant(&mut self, n: f64) -> u32 {
        self.constants.add_number(n)
    }

    // ---- variables ----

    /// Register of a local visible in the current function. A name bound in
    /// an enclosing function would need an upvalue, which has no lowering.
    fn local(&self, name: &str) -> CompileResult<Option<u32>> {
        if let Some(reg) = self.cur.scope.resolve_local(name) {
            return Ok(Some(reg));
        }
        if self
            .enclosing
            .iter()
            .any(|f| f.scope.resolve_local(name).is_some())
        {
            return Err(CompileError::unsupported(format!(
                "upvalue '{name}' (captured local of an enclosing function)"
            )));
        }
        Ok(None)
    }

    /// Store R[value] into the variable `name`.
    fn store_name(&mut self, name: &str, value: u32) -> CompileResult<()> {
        match self.local(name)? {
            Some(reg) if reg == value => Ok(()),
            Some(reg) => self.emit(OpCode::Move, reg, value, 0).map(drop),
            None => {
                let k = self.string_constant(name);
                self.emit(OpCode::SetGlobal, value, k, 0).map(drop)
            }
        }
    }

    // ---- functions ----

    /// Compile a function body into a new prototype and return its index.
    fn function(
        &mut self,
        name: &str,
        params: &[String],
        is_vararg: bool,
        body: &Block,
    ) -> CompileResult<u32> {
        let index = self.protos.len();
        self.protos.push(Proto::default());

        let mut state = FuncState {
            proto: Proto::new(name),
            scope: ScopeManager::new(),
        };
        state.proto.num_params = operand(params.len() as u32, "parameters")?;
        state.proto.is_vararg = is_vararg;
        for param in params {
            state.scope.add_local(param.as_str());
        }

        let parent = std::mem::replace(&mut self.cur, state);
        self.enclosing.push(parent);

        self.block(body)?;
        self.emit(OpCode::Return, 0, 1, 0)?;

        let parent = self.enclosing.pop().unwrap_or_default();
        let done = std::mem::replace(&mut self.cur, parent);
        trace!(name, index, instructions = done.proto.code.len(), "finished function");
        self.protos[index] = done.proto;
        Ok(index as u32)
    }

    // ---- statements ----

    fn block(&mut self, body: &Block) -> CompileResult<()> {
        self.cur.scope.enter_block(false);
        for stat in body {
            self.statement(stat)?;
        }
        self.leave_block()
    }

    /// Close the innermost block and patch its breaks to the current pc.
    fn leave_block(&mut self) -> CompileResult<()> {
        if let Some(block) = self.cur.scope.leave_block() {
            for jump in block.break_jumps {
                self.patch_here(jump)?;
            }
        }
        Ok(())
    }

    fn statement(&mut self, stat: &Statement) -> CompileResult<()> {
        let base = self.cur.scope.free_reg();
        match stat {
            Statement::Local { names, values } => {
                self.explist_to(values, base, names.len() as u32)?;
                for name in names {
                    self.cur.scope.add_local(name.as_str());
                }
                Ok(())
            }
            Statement::Assignment { targets, values } => self.assignment(targets, values, base),
            Statement::CallStatement(call) => self.expr_multi(call, base, Some(0)),
            Statement::Function { name, func } => self.function_stat(name, func, base),
            Statement::If { clauses, else_body } => self.if_stat(clauses, else_body.as_ref(), base),
            Statement::While { condition, body } => {
                let start = self.pc();
                let cond = self.expr_any(condition, base)?;
                let exit = self.emit_jump(OpCode::Test, cond, 0)?;
                self.cur.scope.enter_block(true);
                for stat in body {
                    self.statement(stat)?;
                }
                self.emit_jump_to(OpCode::Jmp, 0, 0, start)?;
                // Breaks land after the back edge.
                self.leave_block()?;
                self.patch_here(exit)
            }
            Statement::Repeat { body, condition } => {
                let start = self.pc();
                self.cur.scope.enter_block(true);
                for stat in body {
                    self.statement(stat)?;
                }
                // The condition can see the body's locals.
                let reg = self.cur.scope.free_reg();
                let cond = self.expr_any(condition, reg)?;
                self.emit_jump_to(OpCode::Test, cond, 0, start)?;
                self.leave_block()
            }
            Statement::ForNumeric {
                var,
                start,
                limit,
                step,
                body,
            } => self.for_numeric(var, start, limit, step.as_ref(), body, base),
            Statement::ForGeneric {
                vars,
                iterators,
                body,
            } => self.for_generic(vars, iterators, body, base),
            Statement::Return(values) => {
                let b = match self.explist_open(values, base)? {
                    Some(count) => count + 1,
                    None => 0,
                };
                self.emit(OpCode::Return, base, b, 0).map(drop)
            }
            Statement::Break => {
                let jump = self.emit_jump(OpCode::Jmp, 0, 0)?;
                match self.cur.scope.find_loop_block() {
                    Some(block) => {
                        block.break_jumps.push(jump);
                        Ok(())
                    }
                    None => Err(CompileError::unsupported("'break' outside a loop")),
                }
            }
            Statement::Do(body) => self.block(body),
        }
    }

    /// Values go to scratch registers first, then targets are stored right
    /// to left.
    fn assignment(
        &mut self,
        targets: &[Expression],
        values: &[Expression],
        base: u32,
    ) -> CompileResult<()> {
        let count = targets.len() as u32;
        self.explist_to(values, base, count)?;
        let scratch = base + count;
        for (i, target) in targets.iter().enumerate().rev() {
            let value = base + i as u32;
            match target {
                Expression::Identifier(name) => self.store_name(name, value)?,
                Expression::Member { base: object, name, .. } => {
                    let table = self.expr_any(object, scratch)?;
                    let key = self.string_constant(name);
                    self.emit(OpCode::LoadK, scratch + 1, key, 0)?;
                    self.emit(OpCode::SetTable, table, scratch + 1, value)?;
                }
                Expression::Index { base: object, key } => {
                    let table = self.expr_any(object, scratch)?;
                    let key = self.expr_any(key, scratch + 1)?;
                    self.emit(OpCode::SetTable, table, key, value)?;
                }
                other => {
                    return Err(CompileError::unsupported(format!(
                        "assignment to {}",
                        other.kind_name()
                    )))
                }
            }
        }
        Ok(())
    }

    fn function_stat(
        &mut self,
        name: &FunctionName,
        func: &FunctionBody,
        base: u32,
    ) -> CompileResult<()> {
        match name {
            FunctionName::Local(local) => {
                let reg = self.cur.scope.add_local(local.as_str());
                let index = self.function(local, &func.params, func.is_vararg, &func.body)?;
                self.emit(OpCode::Closure, reg, index, 0).map(drop)
            }
            FunctionName::Path {
                base: root,
                fields,
                method,
            } => {
                let mut path = root.clone();
                for field in fields {
                    path.push('.');
                    path.push_str(field);
                }
                if let Some(m) = method {
                    path.push(':');
                    path.push_str(m);
                }
                let index = self.function(&path, &func.params, func.is_vararg, &func.body)?;
                self.emit(OpCode::Closure, base, index, 0)?;

                let mut keys: Vec<&String> = fields.iter().collect();
                keys.extend(method.iter());
                let Some((last, intermediate)) = keys.split_last() else {
                    return self.store_name(root, base);
                };
                let mut table = self.expr_any(&Expression::Identifier(root.clone()), base + 1)?;
                for field in intermediate {
                    let k = self.string_constant(field);
                    self.emit(OpCode::LoadK, base + 2, k, 0)?;
                    self.emit(OpCode::GetTable, base + 1, table, base + 2)?;
                    table = base + 1;
                }
                let k = self.string_constant(last);
                self.emit(OpCode::LoadK, base + 2, k, 0)?;
                self.emit(OpCode::SetTable, table, base + 2, base).map(drop)
            }
        }
    }

    /// Each clause: test the condition, skip its body when false. Bodies
    /// that are not last jump to the end.
    fn if_stat(&mut self, clauses: &[IfClause], else_body: Option<&Block>, base: u32) -> CompileResult<()> {
        let mut exits = Vec::new();
        for (i, clause) in clauses.iter().enumerate() {
            let cond = self.expr_any(&clause.condition, base)?;
            let skip = self.emit_jump(OpCode::Test, cond, 0)?;
            self.block(&clause.body)?;
            let is_last = i + 1 == clauses.len();
            if !is_last || else_body.is_some() {
                exits.push(self.emit_jump(OpCode::Jmp, 0, 0)?);
            }
            self.patch_here(skip)?;
        }
        if let Some(body) = else_body {
            self.block(body)?;
        }
        for exit in exits {
            self.patch_here(exit)?;
        }
        Ok(())
    }

    fn for_numeric(
        &mut self,
        var: &str,
        start: &Expression,
        limit: &Expression,
        step: Option<&Expression>,
        body: &Block,
        base: u32,
    ) -> CompileResult<()> {
        self.expr(start, base)?;
        self.expr(limit, base + 1)?;
        match step {
            Some(step) => self.expr(step, base + 2)?,
            None => {
                let one = self.number_constant(1.0);
                self.emit(OpCode::LoadK, base + 2, one, 0)?;
            }
        }
        self.cur.scope.enter_block(true);
        self.cur.scope.add_local("(for index)");
        self.cur.scope.add_local("(for limit)");
        self.cur.scope.add_local("(for step)");
        self.cur.scope.add_local(var);

        let prep = self.emit_jump(OpCode::ForPrep, base, 0)?;
        let body_start = self.pc();
        self.block(body)?;
        self.patch_here(prep)?;
        self.emit_jump_to(OpCode::ForLoop, base, 0, body_start)?;
        self.leave_block()
    }

    fn for_generic(
        &mut self,
        vars: &[String],
        iterators: &[Expression],
        body: &Block,
        base: u32,
    ) -> CompileResult<()> {
        self.explist_to(iterators, base, 3)?;
        self.cur.scope.enter_block(true);
        self.cur.scope.add_local("(for generator)");
        self.cur.scope.add_local("(for state)");
        self.cur.scope.add_local("(for control)");
        for var in vars {
            self.cur.scope.add_local(var.as_str());
        }

        let enter = self.emit_jump(OpCode::Jmp, 0, 0)?;
        let body_start = self.pc();
        self.block(body)?;
        self.patch_here(enter)?;
        self.emit_jump_to(OpCode::TForLoop, base, vars.len() as u32, body_start)?;
        self.leave_block()
    }
}

fn operand(value: u32, what: &'static str) -> CompileResult<u16> {
    u16::try_from(value).map_err(|_| CompileError::LimitExceeded {
        what,
        limit: MAX_OPERAND as usize,
    })
}
