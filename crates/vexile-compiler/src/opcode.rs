//! Logical opcodes, instructions and the per-compile randomized encoding.
//!
//! Serialized instruction format (7 bytes):
//! - byte 0: numeric opcode, looked up through the unit's `OpcodeMap`
//! - bytes 1-2: A (u16, big-endian)
//! - bytes 3-4: B (u16, big-endian)
//! - bytes 5-6: C (u16, big-endian)
//!
//! Signed jump offsets live in B, biased by `JUMP_BIAS`, and count
//! instruction slots relative to the instruction after the branch.

use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;

pub const INSTRUCTION_SIZE: usize = 7;
pub const MAX_OPERAND: u32 = u16::MAX as u32;
pub const JUMP_BIAS: i32 = 32768;
pub const MAX_JUMP: i32 = MAX_OPERAND as i32 - JUMP_BIAS; // 32767
pub const MIN_JUMP: i32 = -JUMP_BIAS;

/// The fixed logical opcode set, in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// R[a] = R[b]
    Move = 0,
    /// R[a] = K[b]
    LoadK,
    /// R[a] = (b != 0)
    LoadBool,
    /// R[a..=a+b] = nil
    LoadNil,
    /// R[a] = Env[K[b]]
    GetGlobal,
    /// Env[K[b]] = R[a]
    SetGlobal,
    /// R[a] = R[b][R[c]]
    GetTable,
    /// R[a][R[b]] = R[c]
    SetTable,
    /// R[a] = {}
    NewTable,
    /// R[a][c+i-1] = R[a+i] for i in 1..=b (b == 0: up to top)
    SetList,
    /// R[a..a+c-2] = R[a](R[a+1..a+b-1]); b == 0 and c == 0 mean "to top"
    Call,
    /// return R[a..a+b-2] (b == 0: up to top)
    Return,
    /// R[a] = closure(protos[b])
    Closure,
    /// R[a..a+b-2] = ... (b == 0: all, sets top)
    VarArg,
    /// R[a] = R[b] + R[c]
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    /// R[a] = R[b] .. R[c]
    Concat,
    /// R[a] = -R[b]
    Unm,
    /// R[a] = not R[b]
    Not,
    /// R[a] = #R[b]
    Len,
    /// R[a] = R[b] == R[c]
    Eq,
    /// R[a] = R[b] < R[c]
    Lt,
    /// R[a] = R[b] <= R[c]
    Le,
    /// pc += sJ(b)
    Jmp,
    /// if truthy(R[a]) == (c != 0) then pc += sJ(b)
    Test,
    /// R[a] -= R[a+2]; pc += sJ(b)
    ForPrep,
    /// R[a] += R[a+2]; if in range { R[a+3] = R[a]; pc += sJ(b) }
    ForLoop,
    /// R[a+3..a+2+c] = R[a](R[a+1], R[a+2]); if R[a+3] ~= nil { R[a+2] = R[a+3]; pc += sJ(b) }
    TForLoop,
}

impl OpCode {
    pub const COUNT: usize = 32;

    pub const ALL: [OpCode; OpCode::COUNT] = [
        OpCode::Move,
        OpCode::LoadK,
        OpCode::LoadBool,
        OpCode::LoadNil,
        OpCode::GetGlobal,
        OpCode::SetGlobal,
        OpCode::GetTable,
        OpCode::SetTable,
        OpCode::NewTable,
        OpCode::SetList,
        OpCode::Call,
        OpCode::Return,
        OpCode::Closure,
        OpCode::VarArg,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Mod,
        OpCode::Pow,
        OpCode::Concat,
        OpCode::Unm,
        OpCode::Not,
        OpCode::Len,
        OpCode::Eq,
        OpCode::Lt,
        OpCode::Le,
        OpCode::Jmp,
        OpCode::Test,
        OpCode::ForPrep,
        OpCode::ForLoop,
        OpCode::TForLoop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Move => "MOVE",
            OpCode::LoadK => "LOADK",
            OpCode::LoadBool => "LOADBOOL",
            OpCode::LoadNil => "LOADNIL",
            OpCode::GetGlobal => "GETGLOBAL",
            OpCode::SetGlobal => "SETGLOBAL",
            OpCode::GetTable => "GETTABLE",
            OpCode::SetTable => "SETTABLE",
            OpCode::NewTable => "NEWTABLE",
            OpCode::SetList => "SETLIST",
            OpCode::Call => "CALL",
            OpCode::Return => "RETURN",
            OpCode::Closure => "CLOSURE",
            OpCode::VarArg => "VARARG",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Pow => "POW",
            OpCode::Concat => "CONCAT",
            OpCode::Unm => "UNM",
            OpCode::Not => "NOT",
            OpCode::Len => "LEN",
            OpCode::Eq => "EQ",
            OpCode::Lt => "LT",
            OpCode::Le => "LE",
            OpCode::Jmp => "JMP",
            OpCode::Test => "TEST",
            OpCode::ForPrep => "FORPREP",
            OpCode::ForLoop => "FORLOOP",
            OpCode::TForLoop => "TFORLOOP",
        }
    }

    /// True when B holds a biased jump offset.
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            OpCode::Jmp | OpCode::Test | OpCode::ForPrep | OpCode::ForLoop | OpCode::TForLoop
        )
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One logical instruction. The numeric opcode is assigned at
/// serialization time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub op: OpCode,
    pub a: u16,
    pub b: u16,
    pub c: u16,
}

impl Instruction {
    pub fn abc(op: OpCode, a: u16, b: u16, c: u16) -> Self {
        Instruction { op, a, b, c }
    }

    /// Branch with an offset in `MIN_JUMP..=MAX_JUMP`; out-of-range offsets
    /// are clamped, so callers check the range first.
    pub fn jump(op: OpCode, a: u16, offset: i32, c: u16) -> Self {
        let mut inst = Instruction { op, a, b: 0, c };
        inst.set_offset(offset);
        inst
    }

    pub fn offset(&self) -> i32 {
        i32::from(self.b) - JUMP_BIAS
    }

    pub fn set_offset(&mut self, offset: i32) {
        let clamped = offset.clamp(MIN_JUMP, MAX_JUMP);
        self.b = (clamped + JUMP_BIAS) as u16;
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op.is_jump() {
            write!(f, "{:<10} {} {:+} {}", self.op.name(), self.a, self.offset(), self.c)
        } else {
            write!(f, "{:<10} {} {} {}", self.op.name(), self.a, self.b, self.c)
        }
    }
}

/// Per-compile bijection from logical opcodes onto distinct bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpcodeMap {
    codes: [u8; OpCode::COUNT],
}

impl OpcodeMap {
    /// Shuffle 0..=255 and hand out the first `OpCode::COUNT` values in
    /// declaration order.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut pool: Vec<u8> = (0..=u8::MAX).collect();
        pool.shuffle(rng);
        let mut codes = [0u8; OpCode::COUNT];
        codes.copy_from_slice(&pool[..OpCode::COUNT]);
        OpcodeMap { codes }
    }

    /// Each opcode encoded as its declaration index.
    pub fn identity() -> Self {
        let mut codes = [0u8; OpCode::COUNT];
        for (i, code) in codes.iter_mut().enumerate() {
            *code = i as u8;
        }
        OpcodeMap { codes }
    }

    pub fn code(&self, op: OpCode) -> u8 {
        self.codes[op as usize]
    }

    pub fn decode(&self, byte: u8) -> Option<OpCode> {
        self.codes
            .iter()
            .position(|&c| c == byte)
            .map(|i| OpCode::ALL[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (OpCode, u8)> + '_ {
        OpCode::ALL.iter().map(move |&op| (op, self.code(op)))
    }

    /// Byte values no opcode is mapped to.
    pub fn unused_codes(&self) -> Vec<u8> {
        (0..=u8::MAX).filter(|b| !self.codes.contains(b)).collect()
    }

    pub fn is_injective(&self) -> bool {
        let mut seen = [false; 256];
        self.codes.iter().all(|&c| !std::mem::replace(&mut seen[c as usize], true))
    }
}

/// Serialize instructions through the map.
pub fn encode(code: &[Instruction], map: &OpcodeMap) -> Vec<u8> {
    let mut out = Vec::with_capacity(code.len() * INSTRUCTION_SIZE);
    for inst in code {
        out.push(map.code(inst.op));
        out.extend_from_slice(&inst.a.to_be_bytes());
        out.extend_from_slice(&inst.b.to_be_bytes());
        out.extend_from_slice(&inst.c.to_be_bytes());
    }
    out
}

/// Inverse of `encode`. `None` on a truncated stream or an unmapped byte.
pub fn decode(bytes: &[u8], map: &OpcodeMap) -> Option<Vec<Instruction>> {
    if bytes.len() % INSTRUCTION_SIZE != 0 {
        return None;
    }
    bytes
        .chunks_exact(INSTRUCTION_SIZE)
        .map(|chunk| {
            let op = map.decode(chunk[0])?;
            let field = |i: usize| u16::from_be_bytes([chunk[i], chunk[i + 1]]);
            Some(Instruction::abc(op, field(1), field(3), field(5)))
        })
        .collect()
}
