//! Expression lowering.
//!
//! Every routine targets a destination register and may use any register
//! above it as scratch. Locals always sit below the destination, so scratch
//! use never clobbers a live variable.

use super::{CompileResult, Compiler};
use crate::ast::{BinOp, Expression, Indexer, TableField, UnOp};
use crate::error::CompileError;
use crate::opcode::OpCode;
use rand::Rng;

/// Positional table items buffered in registers before a `SETLIST`.
pub const FIELDS_PER_FLUSH: u32 = 50;

impl<R: Rng + ?Sized> Compiler<'_, R> {
    /// Compile `expr` into exactly R[reg], truncating multiple results.
    pub(super) fn expr(&mut self, expr: &Expression, reg: u32) -> CompileResult<()> {
        match expr {
            Expression::Nil => {
                let k = self.constants.add_nil();
                self.emit(OpCode::LoadK, reg, k, 0)?;
            }
            Expression::Boolean(b) => {
                self.emit(OpCode::LoadBool, reg, u32::from(*b), 0)?;
            }
            Expression::Number(n) => {
                let k = self.number_constant(*n);
                self.emit(OpCode::LoadK, reg, k, 0)?;
            }
            Expression::String(s) => {
                let k = self.string_constant(s);
                self.emit(OpCode::LoadK, reg, k, 0)?;
            }
            Expression::Vararg => self.vararg(reg, Some(1))?,
            Expression::Identifier(name) => match self.local(name)? {
                Some(src) if src == reg => {}
                Some(src) => {
                    self.emit(OpCode::Move, reg, src, 0)?;
                }
                None => {
                    let k = self.string_constant(name);
                    self.emit(OpCode::GetGlobal, reg, k, 0)?;
                }
            },
            Expression::Paren(inner) => self.expr(inner, reg)?,
            Expression::Binary { op, left, right } => self.binary(*op, left, right, reg)?,
            Expression::Unary { op, operand } => {
                let src = self.expr_any(operand, reg)?;
                let code = match op {
                    UnOp::Neg => OpCode::Unm,
                    UnOp::Not => OpCode::Not,
                    UnOp::Len => OpCode::Len,
                };
                self.emit(code, reg, src, 0)?;
            }
            Expression::Call { .. } => self.expr_multi(expr, reg, Some(1))?,
            Expression::Member {
                base,
                indexer: Indexer::Dot,
                name,
            } => {
                let table = self.expr_any(base, reg)?;
                let k = self.string_constant(name);
                self.emit(OpCode::LoadK, reg + 1, k, 0)?;
                self.emit(OpCode::GetTable, reg, table, reg + 1)?;
            }
            Expression::Member {
                indexer: Indexer::Colon,
                name,
                ..
            } => {
                return Err(CompileError::unsupported(format!(
                    "method reference ':{name}' outside a call"
                )))
            }
            Expression::Index { base, key } => {
                let table = self.expr_any(base, reg)?;
                let key = self.expr_any(key, reg + 1)?;
                self.emit(OpCode::GetTable, reg, table, key)?;
            }
            Expression::Table(fields) => self.table(fields, reg)?,
            Expression::Function(func) => {
                let index = self.function("anonymous", &func.params, func.is_vararg, &func.body)?;
                self.emit(OpCode::Closure, reg, index, 0)?;
            }
        }
        Ok(())
    }

    /// Like `expr`, but a local is read where it lives. Returns the register
    /// that holds the value.
    pub(super) fn expr_any(&mut self, expr: &Expression, reg: u32) -> CompileResult<u32> {
        if let Expression::Identifier(name) = expr {
            if let Some(src) = self.local(name)? {
                return Ok(src);
            }
        }
        self.expr(expr, reg)?;
        Ok(reg)
    }

    /// Compile a possibly multi-valued expression into R[reg..]. `want` is
    /// the number of results, or `None` for all of them (sets top).
    pub(super) fn expr_multi(
        &mut self,
        expr: &Expression,
        reg: u32,
        want: Option<u32>,
    ) -> CompileResult<()> {
        match expr {
            Expression::Call { base, args } => self.call(base, args, reg, want),
            Expression::Vararg => self.vararg(reg, want),
            _ => {
                self.expr(expr, reg)?;
                if let Some(n) = want.filter(|&n| n > 1) {
                    self.emit(OpCode::LoadNil, reg + 1, n - 2, 0)?;
                }
                Ok(())
            }
        }
    }

    /// Adjust an expression list to exactly `want` values in R[reg..].
    /// A trailing call or vararg fills the remaining slots; otherwise they
    /// are set to nil. Surplus values are still evaluated.
    pub(super) fn explist_to(
        &mut self,
        values: &[Expression],
        reg: u32,
        want: u32,
    ) -> CompileResult<()> {
        let count = values.len() as u32;
        for (i, value) in values.iter().enumerate() {
            let i = i as u32;
            if i + 1 == count && i < want && value.is_multi_value() {
                return self.expr_multi(value, reg + i, Some(want - i));
            }
            self.expr(value, reg + i)?;
        }
        if count < want {
            self.emit(OpCode::LoadNil, reg + count, want - count - 1, 0)?;
        }
        Ok(())
    }

    /// Compile a list into R[reg..]. Returns the value count, or `None` when
    /// a trailing call or vararg left the count in top.
    pub(super) fn explist_open(
        &mut self,
        values: &[Expression],
        reg: u32,
    ) -> CompileResult<Option<u32>> {
        for (i, value) in values.iter().enumerate() {
            let r = reg + i as u32;
            if i + 1 == values.len() && value.is_multi_value() {
                self.expr_multi(value, r, None)?;
                return Ok(None);
            }
            self.expr(value, r)?;
        }
        Ok(Some(values.len() as u32))
    }

    fn vararg(&mut self, reg: u32, want: Option<u32>) -> CompileResult<()> {
        if !self.cur.proto.is_vararg {
            return Err(CompileError::unsupported("'...' outside a vararg function"));
        }
        self.emit(OpCode::VarArg, reg, want.map_or(0, |n| n + 1), 0)?;
        Ok(())
    }

    /// Function in R[reg], arguments from R[reg+1]. A method call loads the
    /// object into R[reg+1] as `self` and looks the method up through it.
    fn call(
        &mut self,
        callee: &Expression,
        args: &[Expression],
        reg: u32,
        want: Option<u32>,
    ) -> CompileResult<()> {
        let (first_arg, implicit) = match callee {
            Expression::Member {
                base: object,
                indexer: Indexer::Colon,
                name,
            } => {
                self.expr(object, reg + 1)?;
                let k = self.string_constant(name);
                self.emit(OpCode::LoadK, reg + 2, k, 0)?;
                self.emit(OpCode::GetTable, reg, reg + 1, reg + 2)?;
                (reg + 2, 1)
            }
            _ => {
                self.expr(callee, reg)?;
                (reg + 1, 0)
            }
        };
        let b = match self.explist_open(args, first_arg)? {
            Some(count) => implicit + count + 1,
            None => 0,
        };
        let c = want.map_or(0, |n| n + 1);
        self.emit(OpCode::Call, reg, b, c)?;
        Ok(())
    }

    fn binary(
        &mut self,
        op: BinOp,
        left: &Expression,
        right: &Expression,
        reg: u32,
    ) -> CompileResult<()> {
        if matches!(op, BinOp::And | BinOp::Or) {
            // `and` skips the right side when the left is falsy, `or` when truthy.
            self.expr(left, reg)?;
            let skip = self.emit_jump(OpCode::Test, reg, u32::from(op == BinOp::Or))?;
            self.expr(right, reg)?;
            return self.patch_here(skip);
        }

        let l = self.expr_any(left, reg)?;
        let r = self.expr_any(right, reg + 1)?;
        let (code, b, c) = match op {
            BinOp::Add => (OpCode::Add, l, r),
            BinOp::Sub => (OpCode::Sub, l, r),
            BinOp::Mul => (OpCode::Mul, l, r),
            BinOp::Div => (OpCode::Div, l, r),
            BinOp::Mod => (OpCode::Mod, l, r),
            BinOp::Pow => (OpCode::Pow, l, r),
            BinOp::Concat => (OpCode::Concat, l, r),
            BinOp::Eq | BinOp::NotEq => (OpCode::Eq, l, r),
            BinOp::Lt => (OpCode::Lt, l, r),
            BinOp::LtEq => (OpCode::Le, l, r),
            BinOp::Gt => (OpCode::Lt, r, l),
            BinOp::GtEq => (OpCode::Le, r, l),
            BinOp::And | BinOp::Or => unreachable!("short-circuit operators handled above"),
        };
        self.emit(code, reg, b, c)?;
        if op == BinOp::NotEq {
            self.emit(OpCode::Not, reg, reg, 0)?;
        }
        Ok(())
    }

    /// `NEWTABLE`, then positional items batched into `SETLIST`s and keyed
    /// fields stored one by one, in source order.
    fn table(&mut self, fields: &[TableField], reg: u32) -> CompileResult<()> {
        self.emit(OpCode::NewTable, reg, 0, 0)?;
        let mut pending = 0u32;
        let mut next_index = 1u32;
        for (i, field) in fields.iter().enumerate() {
            let slot = reg + 1 + pending;
            match field {
                TableField::Positional(value) => {
                    if i + 1 == fields.len() && value.is_multi_value() {
                        self.expr_multi(value, slot, None)?;
                        self.emit(OpCode::SetList, reg, 0, next_index)?;
                        return Ok(());
                    }
                    self.expr(value, slot)?;
                    pending += 1;
                    if pending == FIELDS_PER_FLUSH {
                        self.emit(OpCode::SetList, reg, pending, next_index)?;
                        next_index += pending;
                        pending = 0;
                    }
                }
                TableField::Named { name, value } => {
                    let k = self.string_constant(name);
                    self.emit(OpCode::LoadK, slot, k, 0)?;
                    let v = self.expr_any(value, slot + 1)?;
                    self.emit(OpCode::SetTable, reg, slot, v)?;
                }
                TableField::Keyed { key, value } => {
                    let k = self.expr_any(key, slot)?;
                    let v = self.expr_any(value, slot + 1)?;
                    self.emit(OpCode::SetTable, reg, k, v)?;
                }
            }
        }
        if pending > 0 {
            self.emit(OpCode::SetList, reg, pending, next_index)?;
        }
        Ok(())
    }
}
