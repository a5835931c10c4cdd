//! The EVM instruction set as seen by the tracer.
//!
//! Every defined opcode carries its stack requirements (`delta` items popped,
//! `alpha` items pushed), the instruction family it belongs to and whether it
//! is forbidden inside a static context.

/// Groups of instructions sharing a tracing path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstructionFamily {
    Add,
    Mul,
    Mod,
    Ext,
    Wcp,
    Bin,
    Shf,
    Kec,
    Context,
    Account,
    Copy,
    Transaction,
    Batch,
    StackRam,
    Storage,
    Jump,
    MachineState,
    PushPop,
    Dup,
    Swap,
    Log,
    Create,
    Call,
    Halt,
    Invalid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    Stop,
    Add,
    Mul,
    Sub,
    Div,
    Sdiv,
    Mod,
    Smod,
    AddMod,
    MulMod,
    Exp,
    SignExtend,
    Lt,
    Gt,
    Slt,
    Sgt,
    Eq,
    IsZero,
    And,
    Or,
    Xor,
    Not,
    Byte,
    Shl,
    Shr,
    Sar,
    Keccak256,
    Address,
    Balance,
    Origin,
    Caller,
    CallValue,
    CallDataLoad,
    CallDataSize,
    CallDataCopy,
    CodeSize,
    CodeCopy,
    GasPrice,
    ExtCodeSize,
    ExtCodeCopy,
    ReturnDataSize,
    ReturnDataCopy,
    ExtCodeHash,
    BlockHash,
    Coinbase,
    Timestamp,
    Number,
    PrevRandao,
    GasLimit,
    ChainId,
    SelfBalance,
    BaseFee,
    BlobHash,
    BlobBaseFee,
    Pop,
    MLoad,
    MStore,
    MStore8,
    SLoad,
    SStore,
    Jump,
    JumpI,
    Pc,
    MSize,
    Gas,
    JumpDest,
    TLoad,
    TStore,
    MCopy,
    /// `PUSH0` to `PUSH32`, carrying the number of immediate bytes.
    Push(u8),
    /// `DUP1` to `DUP16`.
    Dup(u8),
    /// `SWAP1` to `SWAP16`.
    Swap(u8),
    /// `LOG0` to `LOG4`, carrying the number of topics.
    Log(u8),
    Create,
    Call,
    CallCode,
    Return,
    DelegateCall,
    Create2,
    StaticCall,
    Revert,
    Invalid,
    SelfDestruct,
}

/// Static description of an opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpCodeInfo {
    pub family: InstructionFamily,
    /// Number of stack items consumed.
    pub delta: usize,
    /// Number of stack items produced.
    pub alpha: usize,
    pub forbidden_in_static: bool,
}

impl OpCode {
    /// Decodes an opcode byte. Undefined bytes return `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        use OpCode::*;
        let op = match byte {
            0x00 => Stop,
            0x01 => Add,
            0x02 => Mul,
            0x03 => Sub,
            0x04 => Div,
            0x05 => Sdiv,
            0x06 => Mod,
            0x07 => Smod,
            0x08 => AddMod,
            0x09 => MulMod,
            0x0a => Exp,
            0x0b => SignExtend,
            0x10 => Lt,
            0x11 => Gt,
            0x12 => Slt,
            0x13 => Sgt,
            0x14 => Eq,
            0x15 => IsZero,
            0x16 => And,
            0x17 => Or,
            0x18 => Xor,
            0x19 => Not,
            0x1a => Byte,
            0x1b => Shl,
            0x1c => Shr,
            0x1d => Sar,
            0x20 => Keccak256,
            0x30 => Address,
            0x31 => Balance,
            0x32 => Origin,
            0x33 => Caller,
            0x34 => CallValue,
            0x35 => CallDataLoad,
            0x36 => CallDataSize,
            0x37 => CallDataCopy,
            0x38 => CodeSize,
            0x39 => CodeCopy,
            0x3a => GasPrice,
            0x3b => ExtCodeSize,
            0x3c => ExtCodeCopy,
            0x3d => ReturnDataSize,
            0x3e => ReturnDataCopy,
            0x3f => ExtCodeHash,
            0x40 => BlockHash,
            0x41 => Coinbase,
            0x42 => Timestamp,
            0x43 => Number,
            0x44 => PrevRandao,
            0x45 => GasLimit,
            0x46 => ChainId,
            0x47 => SelfBalance,
            0x48 => BaseFee,
            0x49 => BlobHash,
            0x4a => BlobBaseFee,
            0x50 => Pop,
            0x51 => MLoad,
            0x52 => MStore,
            0x53 => MStore8,
            0x54 => SLoad,
            0x55 => SStore,
            0x56 => Jump,
            0x57 => JumpI,
            0x58 => Pc,
            0x59 => MSize,
            0x5a => Gas,
            0x5b => JumpDest,
            0x5c => TLoad,
            0x5d => TStore,
            0x5e => MCopy,
            0x5f..=0x7f => Push(byte - 0x5f),
            0x80..=0x8f => Dup(byte - 0x7f),
            0x90..=0x9f => Swap(byte - 0x8f),
            0xa0..=0xa4 => Log(byte - 0xa0),
            0xf0 => Create,
            0xf1 => Call,
            0xf2 => CallCode,
            0xf3 => Return,
            0xf4 => DelegateCall,
            0xf5 => Create2,
            0xfa => StaticCall,
            0xfd => Revert,
            0xfe => Invalid,
            0xff => SelfDestruct,
            _ => return None,
        };
        Some(op)
    }

    /// The opcode byte.
    pub const fn byte(self) -> u8 {
        use OpCode::*;
        match self {
            Stop => 0x00,
            Add => 0x01,
            Mul => 0x02,
            Sub => 0x03,
            Div => 0x04,
            Sdiv => 0x05,
            Mod => 0x06,
            Smod => 0x07,
            AddMod => 0x08,
            MulMod => 0x09,
            Exp => 0x0a,
            SignExtend => 0x0b,
            Lt => 0x10,
            Gt => 0x11,
            Slt => 0x12,
            Sgt => 0x13,
            Eq => 0x14,
            IsZero => 0x15,
            And => 0x16,
            Or => 0x17,
            Xor => 0x18,
            Not => 0x19,
            Byte => 0x1a,
            Shl => 0x1b,
            Shr => 0x1c,
            Sar => 0x1d,
            Keccak256 => 0x20,
            Address => 0x30,
            Balance => 0x31,
            Origin => 0x32,
            Caller => 0x33,
            CallValue => 0x34,
            CallDataLoad => 0x35,
            CallDataSize => 0x36,
            CallDataCopy => 0x37,
            CodeSize => 0x38,
            CodeCopy => 0x39,
            GasPrice => 0x3a,
            ExtCodeSize => 0x3b,
            ExtCodeCopy => 0x3c,
            ReturnDataSize => 0x3d,
            ReturnDataCopy => 0x3e,
            ExtCodeHash => 0x3f,
            BlockHash => 0x40,
            Coinbase => 0x41,
            Timestamp => 0x42,
            Number => 0x43,
            PrevRandao => 0x44,
            GasLimit => 0x45,
            ChainId => 0x46,
            SelfBalance => 0x47,
            BaseFee => 0x48,
            BlobHash => 0x49,
            BlobBaseFee => 0x4a,
            Pop => 0x50,
            MLoad => 0x51,
            MStore => 0x52,
            MStore8 => 0x53,
            SLoad => 0x54,
            SStore => 0x55,
            Jump => 0x56,
            JumpI => 0x57,
            Pc => 0x58,
            MSize => 0x59,
            Gas => 0x5a,
            JumpDest => 0x5b,
            TLoad => 0x5c,
            TStore => 0x5d,
            MCopy => 0x5e,
            Push(n) => 0x5f + n,
            Dup(n) => 0x7f + n,
            Swap(n) => 0x8f + n,
            Log(n) => 0xa0 + n,
            Create => 0xf0,
            Call => 0xf1,
            CallCode => 0xf2,
            Return => 0xf3,
            DelegateCall => 0xf4,
            Create2 => 0xf5,
            StaticCall => 0xfa,
            Revert => 0xfd,
            Invalid => 0xfe,
            SelfDestruct => 0xff,
        }
    }

    pub fn info(self) -> OpCodeInfo {
        use InstructionFamily as F;
        use OpCode::*;
        let (family, delta, alpha) = match self {
            Add | Sub => (F::Add, 2, 1),
            Mul | Exp => (F::Mul, 2, 1),
            Div | Sdiv | Mod | Smod => (F::Mod, 2, 1),
            AddMod | MulMod => (F::Ext, 3, 1),
            Lt | Gt | Slt | Sgt | Eq => (F::Wcp, 2, 1),
            IsZero => (F::Wcp, 1, 1),
            And | Or | Xor | Byte | SignExtend => (F::Bin, 2, 1),
            Not => (F::Bin, 1, 1),
            Shl | Shr | Sar => (F::Shf, 2, 1),
            Keccak256 => (F::Kec, 2, 1),
            Address | Caller | CallValue | CallDataSize | ReturnDataSize => (F::Context, 0, 1),
            Balance | ExtCodeSize | ExtCodeHash => (F::Account, 1, 1),
            SelfBalance => (F::Account, 0, 1),
            CallDataCopy | CodeCopy | ReturnDataCopy | MCopy => (F::Copy, 3, 0),
            ExtCodeCopy => (F::Copy, 4, 0),
            Origin | GasPrice => (F::Transaction, 0, 1),
            BlockHash | BlobHash => (F::Batch, 1, 1),
            Coinbase | Timestamp | Number | PrevRandao | GasLimit | ChainId | BaseFee
            | BlobBaseFee => (F::Batch, 0, 1),
            CallDataLoad | MLoad => (F::StackRam, 1, 1),
            MStore | MStore8 => (F::StackRam, 2, 0),
            SLoad | TLoad => (F::Storage, 1, 1),
            SStore | TStore => (F::Storage, 2, 0),
            Jump => (F::Jump, 1, 0),
            JumpI => (F::Jump, 2, 0),
            Pc | MSize | Gas | CodeSize => (F::MachineState, 0, 1),
            JumpDest => (F::MachineState, 0, 0),
            Pop => (F::PushPop, 1, 0),
            Push(_) => (F::PushPop, 0, 1),
            Dup(n) => (F::Dup, n as usize, n as usize + 1),
            Swap(n) => (F::Swap, n as usize + 1, n as usize + 1),
            Log(n) => (F::Log, n as usize + 2, 0),
            Create => (F::Create, 3, 1),
            Create2 => (F::Create, 4, 1),
            Call | CallCode => (F::Call, 7, 1),
            DelegateCall | StaticCall => (F::Call, 6, 1),
            Stop => (F::Halt, 0, 0),
            Return | Revert => (F::Halt, 2, 0),
            SelfDestruct => (F::Halt, 1, 0),
            Invalid => (F::Invalid, 0, 0),
        };
        let forbidden_in_static = matches!(
            self,
            SStore | TStore | Log(_) | Create | Create2 | SelfDestruct
        );
        OpCodeInfo {
            family,
            delta,
            alpha,
            forbidden_in_static,
        }
    }

    pub fn family(self) -> InstructionFamily {
        self.info().family
    }

    pub const fn is_call(self) -> bool {
        matches!(
            self,
            OpCode::Call | OpCode::CallCode | OpCode::DelegateCall | OpCode::StaticCall
        )
    }

    pub const fn is_create(self) -> bool {
        matches!(self, OpCode::Create | OpCode::Create2)
    }

    /// CALL and CALLCODE are the only calls that may transfer value.
    pub const fn call_has_value_argument(self) -> bool {
        matches!(self, OpCode::Call | OpCode::CallCode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_is_inverse_of_byte() {
        let mut defined = 0;
        for byte in 0..=u8::MAX {
            if let Some(op) = OpCode::from_byte(byte) {
                assert_eq!(op.byte(), byte, "{op:?}");
                defined += 1;
            }
        }
        // 33 pushes, 16 dups, 16 swaps, 5 logs and the remaining named opcodes.
        assert_eq!(defined, 149);
    }

    #[test]
    fn undefined_bytes() {
        for byte in [0x0c, 0x1e, 0x21, 0x4b, 0xa5, 0xef, 0xf6, 0xfb] {
            assert_eq!(OpCode::from_byte(byte), None, "{byte:#x}");
        }
    }

    #[test]
    fn stack_requirements() {
        assert_eq!(OpCode::Dup(16).info().delta, 16);
        assert_eq!(OpCode::Dup(16).info().alpha, 17);
        assert_eq!(OpCode::Swap(1).info().delta, 2);
        assert_eq!(OpCode::Log(4).info().delta, 6);
        assert_eq!(OpCode::Call.info().delta, 7);
        assert_eq!(OpCode::StaticCall.info().delta, 6);
        assert!(OpCode::Log(0).info().forbidden_in_static);
        assert!(!OpCode::Call.info().forbidden_in_static);
    }
}
