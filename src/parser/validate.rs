//! Static validation of instruction sequences
//!
//! Validation runs an abstract stack machine over types. Each instruction
//! pops the operand types it consumes (honouring subtyping through the
//! module's [`TypeSpace`]) and pushes its results, so after an instruction the
//! abstract stack reflects exactly its stack diagram. Control frames supply
//! branch label types and the stack floor; the block/loop/if dispatch that
//! creates them lives outside this module.

use super::instruction::{InstructionKind, MemArg, VecSig};
use super::module::Module;
use super::types::{
    AbsHeapType, ArrayType, FieldType, HeapType, RefType, StorageType, StructType, TypeSpace,
    ValueType,
};
use log::{debug, trace};
use std::fmt;
use thiserror::Error;
use MaybeValue::{Unknown, Val};

/// A validation failure, naming the offending instruction
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{instruction}: {kind}")]
pub struct ValidationError {
    pub instruction: &'static str,
    pub kind: ValidationErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationErrorKind {
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("type mismatch: expected {0}, found empty stack")]
    EmptyStack(String),

    #[error("type mismatch: {0} value(s) remaining on stack")]
    UnconsumedValues(usize),

    #[error("unknown type {0}")]
    UnknownType(u32),

    #[error("type {0} is not a struct type")]
    ExpectedStruct(u32),

    #[error("type {0} is not an array type")]
    ExpectedArray(u32),

    #[error("invalid supertype: type {0} cannot extend type {1}")]
    InvalidSupertype(u32, u32),

    #[error("unknown field {1} in type {0}")]
    UnknownField(u32, u32),

    #[error("unknown function {0}")]
    UnknownFunction(u32),

    #[error("unknown memory {0}")]
    UnknownMemory(u32),

    #[error("unknown data segment {0}")]
    UnknownData(u32),

    #[error("data count section required")]
    DataCountRequired,

    #[error("unknown elem segment {0}")]
    UnknownElem(u32),

    #[error("unknown label {0}")]
    UnknownLabel(u32),

    #[error("immutable field {1} of type {0}")]
    ImmutableField(u32, u32),

    #[error("immutable array type {0}")]
    ImmutableArray(u32),

    #[error("packed storage requires a signed or unsigned accessor")]
    PackedAccess,

    #[error("signed or unsigned accessor on unpacked storage")]
    UnpackedAccess,

    #[error("type {0} has a non-defaultable field")]
    NotDefaultable(u32),

    #[error("array type {0} is not numeric or vector")]
    NotNumericArray(u32),

    #[error("element segment type {actual} does not match {expected}")]
    ElemTypeMismatch { expected: String, actual: String },

    #[error("array copy from {src} to {dst}: element types do not match")]
    ArrayCopyMismatch { dst: u32, src: u32 },

    #[error("cast type {to} is not a subtype of {from}")]
    InvalidCast { from: String, to: String },

    #[error("branch label {0} does not end in a reference type")]
    LabelNotRef(u32),

    #[error("alignment must not be larger than natural ({align} > {natural})")]
    BadAlignment { align: u32, natural: u32 },

    #[error("invalid lane index {lane}, must be less than {lanes}")]
    InvalidLane { lane: u8, lanes: u8 },

    #[error("array.new_fixed operand count {0} exceeds the limit of 10000")]
    ArrayNewFixedTooLong(u32),

    #[error("invalid result arity for typed select")]
    InvalidSelectArity,

    #[error("control frame stack is empty")]
    NoFrame,
}

type Result<T> = std::result::Result<T, ValidationErrorKind>;

/// Largest operand count accepted by `array.new_fixed`
pub const MAX_ARRAY_NEW_FIXED: u32 = 10_000;

/// An operand type, or the polymorphic bottom left behind by unreachable code
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum MaybeValue {
    Val(ValueType),
    Unknown,
}

impl MaybeValue {
    pub fn is_num(&self) -> bool {
        match self {
            Val(v) => v.is_num(),
            Unknown => true,
        }
    }

    pub fn is_vec(&self) -> bool {
        match self {
            Val(v) => *v == ValueType::V128,
            Unknown => true,
        }
    }

    pub fn is_ref(&self) -> bool {
        match self {
            Val(v) => v.is_ref(),
            Unknown => true,
        }
    }
}

impl fmt::Display for MaybeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val(t) => write!(f, "{t}"),
            Unknown => write!(f, "unknown"),
        }
    }
}

fn mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> ValidationErrorKind {
    ValidationErrorKind::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

/// The abstract operand stack used during validation
pub struct OperandStack<'a> {
    types: &'a TypeSpace,
    vals: Vec<MaybeValue>,
    /// Height of the innermost control frame's base
    floor: usize,
    unreachable: bool,
}

impl<'a> OperandStack<'a> {
    pub fn new(types: &'a TypeSpace) -> Self {
        OperandStack {
            types,
            vals: vec![],
            floor: 0,
            unreachable: false,
        }
    }

    pub fn height(&self) -> usize {
        self.vals.len()
    }

    pub fn types(&self) -> &'a TypeSpace {
        self.types
    }

    pub fn push_type(&mut self, t: ValueType) {
        self.vals.push(Val(t));
    }

    pub fn push_maybe(&mut self, m: MaybeValue) {
        self.vals.push(m);
    }

    pub fn push_i32(&mut self) {
        self.push_type(ValueType::I32);
    }

    pub fn push_i64(&mut self) {
        self.push_type(ValueType::I64);
    }

    pub fn push_f32(&mut self) {
        self.push_type(ValueType::F32);
    }

    pub fn push_f64(&mut self) {
        self.push_type(ValueType::F64);
    }

    pub fn push_v128(&mut self) {
        self.push_type(ValueType::V128);
    }

    pub fn push_ref(&mut self, rt: RefType) {
        self.push_type(ValueType::Ref(rt));
    }

    /// Pop an operand of any type. At the frame floor this yields `Unknown`
    /// for unreachable code and an error otherwise.
    pub fn pop_any(&mut self) -> Result<MaybeValue> {
        self.pop_with(|| "a value".to_string())
    }

    fn pop_with(&mut self, expected: impl FnOnce() -> String) -> Result<MaybeValue> {
        if self.vals.len() == self.floor {
            return if self.unreachable {
                Ok(Unknown)
            } else {
                Err(ValidationErrorKind::EmptyStack(expected()))
            };
        }
        self.vals.pop().ok_or_else(|| ValidationErrorKind::EmptyStack(expected()))
    }

    /// Pop an operand that must match `expected`, accounting for subtyping
    pub fn pop_type(&mut self, expected: ValueType) -> Result<MaybeValue> {
        let actual = self.pop_with(|| expected.to_string())?;
        match actual {
            Unknown => Ok(Unknown),
            Val(t) if self.types.value_matches(t, expected) => Ok(actual),
            Val(t) => Err(mismatch(expected, t)),
        }
    }

    pub fn pop_i32(&mut self) -> Result<MaybeValue> {
        self.pop_type(ValueType::I32)
    }

    pub fn pop_i64(&mut self) -> Result<MaybeValue> {
        self.pop_type(ValueType::I64)
    }

    pub fn pop_f32(&mut self) -> Result<MaybeValue> {
        self.pop_type(ValueType::F32)
    }

    pub fn pop_f64(&mut self) -> Result<MaybeValue> {
        self.pop_type(ValueType::F64)
    }

    pub fn pop_v128(&mut self) -> Result<MaybeValue> {
        self.pop_type(ValueType::V128)
    }

    /// Pop any reference. `None` means the bottom type from unreachable code.
    pub fn pop_ref(&mut self) -> Result<Option<RefType>> {
        match self.pop_with(|| "a reference".to_string())? {
            Unknown => Ok(None),
            Val(ValueType::Ref(rt)) => Ok(Some(rt)),
            Val(t) => Err(mismatch("a reference", t)),
        }
    }

    /// Inspect the top operand without removing it
    pub fn peek(&self) -> Result<MaybeValue> {
        if self.vals.len() == self.floor {
            return if self.unreachable {
                Ok(Unknown)
            } else {
                Err(ValidationErrorKind::EmptyStack("a value".to_string()))
            };
        }
        self.vals
            .last()
            .copied()
            .ok_or_else(|| ValidationErrorKind::EmptyStack("a value".to_string()))
    }

    /// Pop `count` operands of `expected`. Stops early once only the
    /// polymorphic bottom of unreachable code is left.
    pub fn pop_repeated(&mut self, expected: ValueType, count: u32) -> Result<()> {
        for _ in 0..count {
            if self.unreachable && self.vals.len() == self.floor {
                break;
            }
            self.pop_type(expected)?;
        }
        Ok(())
    }

    /// Pop `types` as if branching to a label of that type, last type first
    pub fn discard_values(&mut self, types: &[ValueType]) -> Result<()> {
        for t in types.iter().rev() {
            self.pop_type(*t)?;
        }
        Ok(())
    }

    pub fn push_result(&mut self, types: &[ValueType]) {
        for t in types {
            self.push_type(*t);
        }
    }

    fn enter_frame(&mut self, floor: usize, unreachable: bool) {
        self.floor = floor;
        self.unreachable = unreachable;
    }

    fn truncate_to_floor(&mut self) {
        self.vals.truncate(self.floor);
        self.unreachable = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Function,
    Block,
    Loop,
}

#[derive(Debug, Clone)]
pub struct CtrlFrame {
    pub kind: FrameKind,
    pub start_types: Vec<ValueType>,
    pub end_types: Vec<ValueType>,
    pub height: usize,
    pub unreachable: bool,
}

#[derive(Debug, Default)]
pub struct ControlStack {
    frames: Vec<CtrlFrame>,
}

impl ControlStack {
    pub fn push(
        &mut self,
        vals: &mut OperandStack,
        kind: FrameKind,
        start_types: Vec<ValueType>,
        end_types: Vec<ValueType>,
    ) {
        let height = vals.height();
        vals.enter_frame(height, false);
        vals.push_result(&start_types);
        self.frames.push(CtrlFrame {
            kind,
            start_types,
            end_types,
            height,
            unreachable: false,
        });
    }

    /// Close the innermost frame, checking its results are on the stack
    pub fn pop(&mut self, vals: &mut OperandStack) -> Result<CtrlFrame> {
        let frame = self.frames.last().ok_or(ValidationErrorKind::NoFrame)?;
        vals.discard_values(&frame.end_types)?;
        if vals.height() != frame.height {
            return Err(ValidationErrorKind::UnconsumedValues(vals.height() - frame.height));
        }
        let frame = self.frames.pop().ok_or(ValidationErrorKind::NoFrame)?;
        match self.frames.last() {
            Some(outer) => vals.enter_frame(outer.height, outer.unreachable),
            None => vals.enter_frame(0, false),
        }
        Ok(frame)
    }

    /// Operand types a branch to the label at `depth` must provide
    pub fn label_types(&self, depth: u32) -> Result<&[ValueType]> {
        let index = self
            .frames
            .len()
            .checked_sub(depth as usize + 1)
            .ok_or(ValidationErrorKind::UnknownLabel(depth))?;
        let frame = &self.frames[index];
        Ok(if frame.kind == FrameKind::Loop {
            &frame.start_types
        } else {
            &frame.end_types
        })
    }

    /// Mark the rest of the innermost frame as unreachable
    pub fn set_unreachable(&mut self, vals: &mut OperandStack) -> Result<()> {
        let frame = self.frames.last_mut().ok_or(ValidationErrorKind::NoFrame)?;
        frame.unreachable = true;
        vals.truncate_to_floor();
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Validates a function body instruction by instruction
pub struct CodeValidator<'a> {
    module: &'a Module,
    vals: OperandStack<'a>,
    ctrls: ControlStack,
}

impl<'a> CodeValidator<'a> {
    /// Start validating a body whose function returns `results`
    pub fn new(module: &'a Module, results: Vec<ValueType>) -> CodeValidator<'a> {
        let mut vals = OperandStack::new(&module.types);
        let mut ctrls = ControlStack::default();
        ctrls.push(&mut vals, FrameKind::Function, vec![], results);
        CodeValidator { module, vals, ctrls }
    }

    pub fn stack(&self) -> &OperandStack<'a> {
        &self.vals
    }

    /// Open a label, as a block or loop instruction would
    pub fn push_frame(&mut self, kind: FrameKind, params: Vec<ValueType>, results: Vec<ValueType>) {
        self.ctrls.push(&mut self.vals, kind, params, results);
    }

    pub fn pop_frame(&mut self) -> std::result::Result<CtrlFrame, ValidationError> {
        self.ctrls.pop(&mut self.vals).map_err(|kind| ValidationError {
            instruction: "end",
            kind,
        })
    }

    pub fn validate(&mut self, inst: &InstructionKind) -> std::result::Result<(), ValidationError> {
        trace!("validate: {inst}");
        self.validate_kind(inst).map_err(|kind| {
            let err = ValidationError {
                instruction: inst.mnemonic(),
                kind,
            };
            debug!("validation failed: {err}");
            err
        })
    }

    pub fn validate_all(&mut self, code: &[InstructionKind]) -> std::result::Result<(), ValidationError> {
        code.iter().try_for_each(|inst| self.validate(inst))
    }

    /// Close the function frame; the declared results must be exactly what remains
    pub fn finish(mut self) -> std::result::Result<(), ValidationError> {
        while self.ctrls.depth() > 0 {
            self.pop_frame()?;
        }
        Ok(())
    }

    fn types(&self) -> &'a TypeSpace {
        &self.module.types
    }

    fn check_heap(&self, ht: HeapType) -> Result<()> {
        match ht {
            HeapType::Concrete(idx) if !self.types().contains(idx) => Err(ValidationErrorKind::UnknownType(idx)),
            _ => Ok(()),
        }
    }

    fn struct_type(&self, type_idx: u32) -> Result<&'a StructType> {
        if !self.types().contains(type_idx) {
            return Err(ValidationErrorKind::UnknownType(type_idx));
        }
        self.types()
            .struct_type(type_idx)
            .ok_or(ValidationErrorKind::ExpectedStruct(type_idx))
    }

    fn array_type(&self, type_idx: u32) -> Result<&'a ArrayType> {
        if !self.types().contains(type_idx) {
            return Err(ValidationErrorKind::UnknownType(type_idx));
        }
        self.types()
            .array_type(type_idx)
            .ok_or(ValidationErrorKind::ExpectedArray(type_idx))
    }

    fn field(&self, type_idx: u32, field_idx: u32) -> Result<FieldType> {
        self.struct_type(type_idx)?
            .fields
            .get(field_idx as usize)
            .copied()
            .ok_or(ValidationErrorKind::UnknownField(type_idx, field_idx))
    }

    fn mutable_array(&self, type_idx: u32) -> Result<FieldType> {
        let element = self.array_type(type_idx)?.element;
        if !element.mutable {
            return Err(ValidationErrorKind::ImmutableArray(type_idx));
        }
        Ok(element)
    }

    fn check_data(&self, data_idx: u32) -> Result<()> {
        match self.module.data_count {
            None => Err(ValidationErrorKind::DataCountRequired),
            Some(_) if !self.module.has_data(data_idx) => Err(ValidationErrorKind::UnknownData(data_idx)),
            Some(_) => Ok(()),
        }
    }

    fn check_memory(&self, memarg: &MemArg, natural: u32) -> Result<()> {
        if !self.module.has_memory(0) {
            return Err(ValidationErrorKind::UnknownMemory(0));
        }
        if memarg.align > natural {
            return Err(ValidationErrorKind::BadAlignment {
                align: memarg.align,
                natural,
            });
        }
        Ok(())
    }

    /// Packed storage must be read with `_s`/`_u` and unpacked storage without
    fn check_access(storage: StorageType, signed_access: bool) -> Result<()> {
        match (storage.is_packed(), signed_access) {
            (true, false) => Err(ValidationErrorKind::PackedAccess),
            (false, true) => Err(ValidationErrorKind::UnpackedAccess),
            _ => Ok(()),
        }
    }

    fn check_lane(lane: u8, lanes: u8) -> Result<()> {
        if lane >= lanes {
            return Err(ValidationErrorKind::InvalidLane { lane, lanes });
        }
        Ok(())
    }

    fn elem_matches_array(&self, elem_idx: u32, element: FieldType) -> Result<()> {
        let seg = self
            .module
            .element(elem_idx)
            .ok_or(ValidationErrorKind::UnknownElem(elem_idx))?;
        let seg_type = StorageType::Val(ValueType::Ref(seg.ref_type));
        if !self.types().storage_matches(seg_type, element.storage) {
            return Err(ValidationErrorKind::ElemTypeMismatch {
                expected: element.storage.to_string(),
                actual: seg_type.to_string(),
            });
        }
        Ok(())
    }

    fn concrete_ref(type_idx: u32) -> ValueType {
        ValueType::Ref(RefType::nullable(HeapType::Concrete(type_idx)))
    }

    fn top_ref(&self, rt: RefType) -> ValueType {
        ValueType::Ref(RefType::nullable(self.types().top_heap_type(rt.heap)))
    }

    /// The label of a cast branch must end in a reference; returns the
    /// prefix and that final reference type
    fn cast_label(&self, label_idx: u32) -> Result<(Vec<ValueType>, RefType)> {
        let label = self.ctrls.label_types(label_idx)?;
        match label.split_last() {
            Some((ValueType::Ref(rt), prefix)) => Ok((prefix.to_vec(), *rt)),
            _ => Err(ValidationErrorKind::LabelNotRef(label_idx)),
        }
    }

    fn check_label_ref(&self, actual: RefType, label: RefType) -> Result<()> {
        if !self.types().ref_matches(actual, label) {
            return Err(mismatch(ValueType::Ref(label), ValueType::Ref(actual)));
        }
        Ok(())
    }

    fn validate_kind(&mut self, inst: &InstructionKind) -> Result<()> {
        use InstructionKind::*;
        match inst {
            Unreachable => self.ctrls.set_unreachable(&mut self.vals)?,
            Nop => {}
            Drop => {
                self.vals.pop_any()?;
            }
            Select => {
                self.vals.pop_i32()?;
                let t1 = self.vals.pop_any()?;
                let t2 = self.vals.pop_any()?;
                if !(t1.is_num() && t2.is_num() || t1.is_vec() && t2.is_vec()) {
                    return Err(mismatch("numeric or vector operands", format!("{t2} {t1}")));
                }
                match (t1, t2) {
                    (Val(a), Val(b)) if a != b => return Err(mismatch(b, a)),
                    (Unknown, t) => self.vals.push_maybe(t),
                    (t, _) => self.vals.push_maybe(t),
                }
            }
            SelectTyped { val_types } => {
                let [t] = val_types.as_slice() else {
                    return Err(ValidationErrorKind::InvalidSelectArity);
                };
                if let ValueType::Ref(rt) = t {
                    self.check_heap(rt.heap)?;
                }
                self.vals.pop_i32()?;
                self.vals.pop_type(*t)?;
                self.vals.pop_type(*t)?;
                self.vals.push_type(*t);
            }

            I32Const { .. } => self.vals.push_i32(),
            I64Const { .. } => self.vals.push_i64(),
            F32Const { .. } => self.vals.push_f32(),
            F64Const { .. } => self.vals.push_f64(),
            V128Const { .. } => self.vals.push_v128(),

            Num(op) => {
                let sig = op.signature();
                self.vals.discard_values(&sig.params())?;
                self.vals.push_type(sig.result());
            }
            Simd(op) => {
                let sig: VecSig = op.signature();
                self.vals.discard_values(&sig.params())?;
                self.vals.push_type(sig.result());
            }

            V128Load { memarg } => {
                self.check_memory(memarg, 4)?;
                self.vals.pop_i32()?;
                self.vals.push_v128();
            }
            V128Store { memarg } => {
                self.check_memory(memarg, 4)?;
                self.vals.pop_v128()?;
                self.vals.pop_i32()?;
            }
            V128LoadExtend { memarg, .. } => {
                self.check_memory(memarg, 3)?;
                self.vals.pop_i32()?;
                self.vals.push_v128();
            }
            V128LoadSplat { width, memarg } | V128LoadZero { width, memarg } => {
                self.check_memory(memarg, width.natural_align())?;
                self.vals.pop_i32()?;
                self.vals.push_v128();
            }
            V128LoadLane { width, memarg, lane } => {
                self.check_memory(memarg, width.natural_align())?;
                Self::check_lane(*lane, width.lanes())?;
                self.vals.pop_v128()?;
                self.vals.pop_i32()?;
                self.vals.push_v128();
            }
            V128StoreLane { width, memarg, lane } => {
                self.check_memory(memarg, width.natural_align())?;
                Self::check_lane(*lane, width.lanes())?;
                self.vals.pop_v128()?;
                self.vals.pop_i32()?;
            }
            I8x16Shuffle { lanes } => {
                for lane in lanes {
                    Self::check_lane(*lane, 32)?;
                }
                self.vals.pop_v128()?;
                self.vals.pop_v128()?;
                self.vals.push_v128();
            }
            ExtractLane { shape, lane, .. } => {
                Self::check_lane(*lane, shape.lanes())?;
                self.vals.pop_v128()?;
                self.vals.push_type(shape.lane_type());
            }
            ReplaceLane { shape, lane } => {
                Self::check_lane(*lane, shape.lanes())?;
                self.vals.pop_type(shape.lane_type())?;
                self.vals.pop_v128()?;
                self.vals.push_v128();
            }

            RefNull { heap } => {
                self.check_heap(*heap)?;
                self.vals.push_ref(RefType::nullable(*heap));
            }
            RefIsNull => {
                self.vals.pop_ref()?;
                self.vals.push_i32();
            }
            RefFunc { func_idx } => {
                let type_idx = self
                    .module
                    .func_type_idx(*func_idx)
                    .ok_or(ValidationErrorKind::UnknownFunction(*func_idx))?;
                self.vals.push_ref(RefType::non_null(HeapType::Concrete(type_idx)));
            }
            RefEq => {
                let eqref = ValueType::Ref(RefType::nullable(HeapType::EQ));
                self.vals.pop_type(eqref)?;
                self.vals.pop_type(eqref)?;
                self.vals.push_i32();
            }
            RefAsNonNull => match self.vals.pop_ref()? {
                Some(rt) => self.vals.push_ref(rt.as_non_null()),
                None => self.vals.push_maybe(Unknown),
            },
            BrOnNull { label_idx } => {
                let popped = self.vals.pop_ref()?;
                let label = self.ctrls.label_types(*label_idx)?.to_vec();
                self.vals.discard_values(&label)?;
                self.vals.push_result(&label);
                match popped {
                    Some(rt) => self.vals.push_ref(rt.as_non_null()),
                    None => self.vals.push_maybe(Unknown),
                }
            }
            BrOnNonNull { label_idx } => {
                let (prefix, label_rt) = self.cast_label(*label_idx)?;
                self.vals.pop_type(ValueType::Ref(label_rt.as_nullable()))?;
                self.vals.discard_values(&prefix)?;
                self.vals.push_result(&prefix);
            }
            RefTest { ref_type } => {
                self.check_heap(ref_type.heap)?;
                let top = self.top_ref(*ref_type);
                self.vals.pop_type(top)?;
                self.vals.push_i32();
            }
            RefCast { ref_type } => {
                self.check_heap(ref_type.heap)?;
                let top = self.top_ref(*ref_type);
                self.vals.pop_type(top)?;
                self.vals.push_ref(*ref_type);
            }
            BrOnCast { label_idx, from, to } | BrOnCastFail { label_idx, from, to } => {
                self.check_heap(from.heap)?;
                self.check_heap(to.heap)?;
                if !self.types().ref_matches(*to, *from) {
                    return Err(ValidationErrorKind::InvalidCast {
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                }
                let (prefix, label_rt) = self.cast_label(*label_idx)?;
                let diff = self.types().ref_diff(*from, *to);
                let (branch, fallthrough) = if matches!(inst, BrOnCast { .. }) {
                    (*to, diff)
                } else {
                    (diff, *to)
                };
                self.check_label_ref(branch, label_rt)?;
                self.vals.pop_type(ValueType::Ref(*from))?;
                self.vals.discard_values(&prefix)?;
                self.vals.push_result(&prefix);
                self.vals.push_ref(fallthrough);
            }
            AnyConvertExtern => {
                let popped = self.vals.pop_type(ValueType::EXTERNREF)?;
                let nullable = matches!(popped, Val(ValueType::Ref(rt)) if rt.nullable);
                self.vals.push_ref(RefType::new(nullable, HeapType::ANY));
            }
            ExternConvertAny => {
                let popped = self.vals.pop_type(ValueType::ANYREF)?;
                let nullable = matches!(popped, Val(ValueType::Ref(rt)) if rt.nullable);
                self.vals.push_ref(RefType::new(nullable, HeapType::EXTERN));
            }
            RefI31 => {
                self.vals.pop_i32()?;
                self.vals.push_ref(RefType::non_null(HeapType::I31));
            }
            I31GetS | I31GetU => {
                self.vals.pop_type(ValueType::Ref(RefType::nullable(HeapType::I31)))?;
                self.vals.push_i32();
            }

            StructNew { type_idx } => {
                let fields = &self.struct_type(*type_idx)?.fields;
                let field_types: Vec<ValueType> = fields.iter().map(|f| f.storage.unpacked()).collect();
                self.vals.discard_values(&field_types)?;
                self.vals.push_ref(RefType::non_null(HeapType::Concrete(*type_idx)));
            }
            StructNewDefault { type_idx } => {
                let st = self.struct_type(*type_idx)?;
                if !st.fields.iter().all(|f| f.storage.unpacked().is_defaultable()) {
                    return Err(ValidationErrorKind::NotDefaultable(*type_idx));
                }
                self.vals.push_ref(RefType::non_null(HeapType::Concrete(*type_idx)));
            }
            StructGet { type_idx, field_idx }
            | StructGetS { type_idx, field_idx }
            | StructGetU { type_idx, field_idx } => {
                let field = self.field(*type_idx, *field_idx)?;
                Self::check_access(field.storage, !matches!(inst, StructGet { .. }))?;
                self.vals.pop_type(Self::concrete_ref(*type_idx))?;
                self.vals.push_type(field.storage.unpacked());
            }
            StructSet { type_idx, field_idx } => {
                let field = self.field(*type_idx, *field_idx)?;
                if !field.mutable {
                    return Err(ValidationErrorKind::ImmutableField(*type_idx, *field_idx));
                }
                self.vals.pop_type(field.storage.unpacked())?;
                self.vals.pop_type(Self::concrete_ref(*type_idx))?;
            }

            ArrayNew { type_idx } => {
                let element = self.array_type(*type_idx)?.element;
                self.vals.pop_i32()?;
                self.vals.pop_type(element.storage.unpacked())?;
                self.vals.push_ref(RefType::non_null(HeapType::Concrete(*type_idx)));
            }
            ArrayNewDefault { type_idx } => {
                let element = self.array_type(*type_idx)?.element;
                if !element.storage.unpacked().is_defaultable() {
                    return Err(ValidationErrorKind::NotDefaultable(*type_idx));
                }
                self.vals.pop_i32()?;
                self.vals.push_ref(RefType::non_null(HeapType::Concrete(*type_idx)));
            }
            ArrayNewFixed { type_idx, len } => {
                let element = self.array_type(*type_idx)?.element;
                if *len > MAX_ARRAY_NEW_FIXED {
                    return Err(ValidationErrorKind::ArrayNewFixedTooLong(*len));
                }
                self.vals.pop_repeated(element.storage.unpacked(), *len)?;
                self.vals.push_ref(RefType::non_null(HeapType::Concrete(*type_idx)));
            }
            ArrayNewData { type_idx, data_idx } => {
                let element = self.array_type(*type_idx)?.element;
                if element.storage.byte_width().is_none() {
                    return Err(ValidationErrorKind::NotNumericArray(*type_idx));
                }
                self.check_data(*data_idx)?;
                self.vals.pop_i32()?;
                self.vals.pop_i32()?;
                self.vals.push_ref(RefType::non_null(HeapType::Concrete(*type_idx)));
            }
            ArrayNewElem { type_idx, elem_idx } => {
                let element = self.array_type(*type_idx)?.element;
                self.elem_matches_array(*elem_idx, element)?;
                self.vals.pop_i32()?;
                self.vals.pop_i32()?;
                self.vals.push_ref(RefType::non_null(HeapType::Concrete(*type_idx)));
            }
            ArrayGet { type_idx } | ArrayGetS { type_idx } | ArrayGetU { type_idx } => {
                let element = self.array_type(*type_idx)?.element;
                Self::check_access(element.storage, !matches!(inst, ArrayGet { .. }))?;
                self.vals.pop_i32()?;
                self.vals.pop_type(Self::concrete_ref(*type_idx))?;
                self.vals.push_type(element.storage.unpacked());
            }
            ArraySet { type_idx } => {
                let element = self.mutable_array(*type_idx)?;
                self.vals.pop_type(element.storage.unpacked())?;
                self.vals.pop_i32()?;
                self.vals.pop_type(Self::concrete_ref(*type_idx))?;
            }
            ArrayLen => {
                let arrayref = ValueType::Ref(RefType::nullable(HeapType::Abstract(AbsHeapType::Array)));
                self.vals.pop_type(arrayref)?;
                self.vals.push_i32();
            }
            ArrayFill { type_idx } => {
                let element = self.mutable_array(*type_idx)?;
                self.vals.pop_i32()?;
                self.vals.pop_type(element.storage.unpacked())?;
                self.vals.pop_i32()?;
                self.vals.pop_type(Self::concrete_ref(*type_idx))?;
            }
            ArrayCopy { dst_type, src_type } => {
                let dst = self.mutable_array(*dst_type)?;
                let src = self.array_type(*src_type)?.element;
                if !self.types().storage_matches(src.storage, dst.storage) {
                    return Err(ValidationErrorKind::ArrayCopyMismatch {
                        dst: *dst_type,
                        src: *src_type,
                    });
                }
                self.vals.pop_i32()?;
                self.vals.pop_i32()?;
                self.vals.pop_type(Self::concrete_ref(*src_type))?;
                self.vals.pop_i32()?;
                self.vals.pop_type(Self::concrete_ref(*dst_type))?;
            }
            ArrayInitData { type_idx, data_idx } => {
                let element = self.mutable_array(*type_idx)?;
                if element.storage.byte_width().is_none() {
                    return Err(ValidationErrorKind::NotNumericArray(*type_idx));
                }
                self.check_data(*data_idx)?;
                self.vals.pop_i32()?;
                self.vals.pop_i32()?;
                self.vals.pop_i32()?;
                self.vals.pop_type(Self::concrete_ref(*type_idx))?;
            }
            ArrayInitElem { type_idx, elem_idx } => {
                let element = self.mutable_array(*type_idx)?;
                self.elem_matches_array(*elem_idx, element)?;
                self.vals.pop_i32()?;
                self.vals.pop_i32()?;
                self.vals.pop_i32()?;
                self.vals.pop_type(Self::concrete_ref(*type_idx))?;
            }
        }
        Ok(())
    }
}

/// Net operand stack change of an instruction with its operands available
pub fn stack_delta(module: &Module, inst: &InstructionKind, operands: &[ValueType]) -> Option<isize> {
    let mut validator = CodeValidator::new(module, vec![]);
    validator.vals.push_result(operands);
    let before = validator.vals.height() as isize;
    validator.validate(inst).ok()?;
    Some(validator.vals.height() as isize - before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::instruction::{LaneWidth, NumOp, Shape, VecOp};
    use crate::parser::module::ElemItem;
    use crate::parser::types::{CompositeType, SubType};
    use InstructionKind::*;

    fn gc_module() -> Module {
        let types = TypeSpace::from_types(vec![
            // 0: (array (mut i8))
            SubType::plain(CompositeType::Array(ArrayType {
                element: FieldType::new(StorageType::I8, true),
            })),
            // 1: (array i32)
            SubType::plain(CompositeType::Array(ArrayType {
                element: FieldType::new(StorageType::Val(ValueType::I32), false),
            })),
            // 2: (struct (field (mut i32)) (field i16) (field (ref 1)))
            SubType::plain(CompositeType::Struct(StructType {
                fields: vec![
                    FieldType::new(StorageType::Val(ValueType::I32), true),
                    FieldType::new(StorageType::I16, false),
                    FieldType::new(
                        StorageType::Val(ValueType::Ref(RefType::non_null(HeapType::Concrete(1)))),
                        false,
                    ),
                ],
            })),
            // 3: (array (mut anyref))
            SubType::plain(CompositeType::Array(ArrayType {
                element: FieldType::new(StorageType::Val(ValueType::ANYREF), true),
            })),
        ])
        .unwrap();
        Module::new(types)
            .with_memory(1, None)
            .with_data(vec![1, 2, 3, 4])
            .with_elements(RefType::non_null(HeapType::I31), vec![ElemItem::I31(1)])
    }

    fn delta(module: &Module, inst: InstructionKind, operands: &[ValueType]) -> Option<isize> {
        stack_delta(module, &inst, operands)
    }

    fn array_ref(idx: u32) -> ValueType {
        ValueType::Ref(RefType::non_null(HeapType::Concrete(idx)))
    }

    #[test]
    fn test_operand_stack_subtyping() {
        let module = gc_module();
        let mut vals = OperandStack::new(&module.types);
        vals.push_ref(RefType::non_null(HeapType::Concrete(0)));
        assert!(vals.pop_type(ValueType::ANYREF).is_ok());
        vals.push_type(ValueType::ANYREF);
        let err = vals.pop_type(array_ref(0)).unwrap_err();
        assert!(matches!(err, ValidationErrorKind::TypeMismatch { .. }));
        assert_eq!(vals.pop_any(), Err(ValidationErrorKind::EmptyStack("a value".to_string())));
    }

    #[test]
    fn test_array_new_fixed_operand_limit() {
        let module = gc_module();
        let mut v = CodeValidator::new(&module, vec![]);
        v.validate(&Unreachable).unwrap();
        let err = v
            .validate(&ArrayNewFixed {
                type_idx: 1,
                len: u32::MAX,
            })
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::ArrayNewFixedTooLong(u32::MAX));

        let mut v = CodeValidator::new(&module, vec![array_ref(1)]);
        v.validate(&Unreachable).unwrap();
        v.validate(&ArrayNewFixed {
            type_idx: 1,
            len: MAX_ARRAY_NEW_FIXED,
        })
        .unwrap();
        v.finish().unwrap();
    }

    #[test]
    fn test_pop_repeated_checks_known_operands() {
        let module = gc_module();
        let mut vals = OperandStack::new(&module.types);
        vals.push_type(ValueType::I32);
        vals.push_type(ValueType::I32);
        assert!(vals.pop_repeated(ValueType::I32, 2).is_ok());
        assert_eq!(vals.height(), 0);
        assert!(matches!(
            vals.pop_repeated(ValueType::I32, 1),
            Err(ValidationErrorKind::EmptyStack(_))
        ));

        vals.truncate_to_floor();
        vals.push_type(ValueType::F32);
        assert!(matches!(
            vals.pop_repeated(ValueType::I32, 5),
            Err(ValidationErrorKind::TypeMismatch { .. })
        ));
        assert!(vals.pop_repeated(ValueType::I32, u32::MAX).is_ok());
    }

    #[test]
    fn test_unreachable_makes_stack_polymorphic() {
        let module = gc_module();
        let mut v = CodeValidator::new(&module, vec![ValueType::V128]);
        v.validate(&I32Const { value: 1 }).unwrap();
        v.validate(&Unreachable).unwrap();
        assert_eq!(v.stack().height(), 0);
        v.validate(&Simd(VecOp::I32x4Add)).unwrap();
        v.finish().unwrap();
    }

    #[test]
    fn test_finish_checks_results() {
        let module = gc_module();
        let mut v = CodeValidator::new(&module, vec![ValueType::I32]);
        v.validate(&I32Const { value: 1 }).unwrap();
        v.validate(&I32Const { value: 2 }).unwrap();
        let err = v.finish().unwrap_err();
        assert_eq!(err.instruction, "end");
        assert_eq!(err.kind, ValidationErrorKind::UnconsumedValues(1));
    }

    #[test]
    fn test_stack_deltas() {
        let module = gc_module();
        let i32 = ValueType::I32;
        assert_eq!(delta(&module, ArraySet { type_idx: 0 }, &[array_ref(0), i32, i32]), Some(-3));
        assert_eq!(
            delta(&module, ArrayFill { type_idx: 0 }, &[array_ref(0), i32, i32, i32]),
            Some(-4)
        );
        assert_eq!(
            delta(
                &module,
                ArrayCopy {
                    dst_type: 0,
                    src_type: 0
                },
                &[array_ref(0), i32, array_ref(0), i32, i32]
            ),
            Some(-5)
        );
        assert_eq!(
            delta(
                &module,
                StructSet {
                    type_idx: 2,
                    field_idx: 0
                },
                &[array_ref(2), i32]
            ),
            Some(-2)
        );
        assert_eq!(delta(&module, Num(NumOp::I32Add), &[i32, i32]), Some(-1));
        assert_eq!(
            delta(&module, Simd(VecOp::V128Bitselect), &[ValueType::V128; 3]),
            Some(-2)
        );
        assert_eq!(delta(&module, ArrayNewFixed { type_idx: 1, len: 3 }, &[i32, i32, i32]), Some(-2));
    }

    #[test]
    fn test_immutable_and_packed_rules() {
        let module = gc_module();
        let i32 = ValueType::I32;
        let mut v = CodeValidator::new(&module, vec![]);
        let err = v.validate(&ArraySet { type_idx: 1 }).unwrap_err();
        assert_eq!(err.to_string(), "array.set: immutable array type 1");

        let err = v
            .validate(&StructSet {
                type_idx: 2,
                field_idx: 1,
            })
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::ImmutableField(2, 1));

        assert!(delta(&module, ArrayGet { type_idx: 0 }, &[array_ref(0), i32]).is_none());
        assert_eq!(delta(&module, ArrayGetU { type_idx: 0 }, &[array_ref(0), i32]), Some(-1));
        assert!(delta(&module, ArrayGetS { type_idx: 1 }, &[array_ref(1), i32]).is_none());
        assert_eq!(
            delta(
                &module,
                StructGetS {
                    type_idx: 2,
                    field_idx: 1
                },
                &[array_ref(2)]
            ),
            Some(0)
        );
        // field 2 is a non-nullable ref so there is no default
        assert!(delta(&module, StructNewDefault { type_idx: 2 }, &[]).is_none());
        assert_eq!(delta(&module, ArrayNewDefault { type_idx: 3 }, &[i32]), Some(0));
    }

    #[test]
    fn test_segment_rules() {
        let module = gc_module();
        let i32 = ValueType::I32;
        assert_eq!(
            delta(&module, ArrayNewData { type_idx: 0, data_idx: 0 }, &[i32, i32]),
            Some(-1)
        );
        assert!(delta(&module, ArrayNewData { type_idx: 0, data_idx: 1 }, &[i32, i32]).is_none());
        assert!(delta(&module, ArrayNewData { type_idx: 3, data_idx: 0 }, &[i32, i32]).is_none());
        assert_eq!(
            delta(&module, ArrayNewElem { type_idx: 3, elem_idx: 0 }, &[i32, i32]),
            Some(-1)
        );
        // i31 refs do not fit an i32 array
        assert!(delta(&module, ArrayNewElem { type_idx: 1, elem_idx: 0 }, &[i32, i32]).is_none());

        let no_count = Module::new(module.types.clone());
        let mut v = CodeValidator::new(&no_count, vec![]);
        let err = v
            .validate(&ArrayInitData {
                type_idx: 0,
                data_idx: 0,
            })
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::DataCountRequired);
    }

    #[test]
    fn test_simd_memory_rules() {
        let module = gc_module();
        let load = |width, align, lane| V128LoadLane {
            width,
            memarg: MemArg::new(align, 0),
            lane,
        };
        let operands = [ValueType::I32, ValueType::V128];
        assert_eq!(delta(&module, load(LaneWidth::W32, 2, 3), &operands), Some(-1));
        assert!(delta(&module, load(LaneWidth::W32, 3, 0), &operands).is_none());
        assert!(delta(&module, load(LaneWidth::W32, 2, 4), &operands).is_none());
        assert!(delta(&module, load(LaneWidth::W8, 0, 16), &operands).is_none());

        let mut v = CodeValidator::new(&module, vec![]);
        v.validate(&I32Const { value: 0 }).unwrap();
        let err = v
            .validate(&V128LoadSplat {
                width: LaneWidth::W16,
                memarg: MemArg::new(2, 0),
            })
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::BadAlignment { align: 2, natural: 1 });

        let no_memory = Module::new(module.types.clone());
        assert!(delta(&no_memory, V128Load { memarg: MemArg::new(0, 0) }, &[ValueType::I32]).is_none());
        assert!(delta(
            &module,
            ExtractLane {
                shape: Shape::F64x2,
                lane: 2,
                signed: false
            },
            &[ValueType::V128]
        )
        .is_none());
    }

    #[test]
    fn test_ref_cast_family() {
        let module = gc_module();
        let anyref = ValueType::ANYREF;
        let cast = RefCast {
            ref_type: RefType::nullable(HeapType::Concrete(0)),
        };
        assert_eq!(delta(&module, cast.clone(), &[anyref]), Some(0));
        // func hierarchy is unrelated to any
        assert!(delta(&module, cast, &[ValueType::FUNCREF]).is_none());

        let mut v = CodeValidator::new(&module, vec![]);
        v.push_frame(FrameKind::Block, vec![], vec![array_ref(0)]);
        v.validate(&RefNull { heap: HeapType::ANY }).unwrap();
        v.validate(&BrOnCast {
            label_idx: 0,
            from: RefType::nullable(HeapType::ANY),
            to: RefType::non_null(HeapType::Concrete(0)),
        })
        .unwrap();
        // fallthrough keeps the nullable source type
        assert_eq!(v.stack().peek(), Ok(Val(ValueType::ANYREF)));

        v.validate(&BrOnCastFail {
            label_idx: 0,
            from: RefType::nullable(HeapType::ANY),
            to: RefType::non_null(HeapType::Concrete(0)),
        })
        .unwrap_err();

        let mut v = CodeValidator::new(&module, vec![]);
        v.push_frame(FrameKind::Block, vec![], vec![ValueType::I32]);
        v.validate(&RefNull { heap: HeapType::ANY }).unwrap();
        let err = v
            .validate(&BrOnNonNull { label_idx: 0 })
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::LabelNotRef(0));
    }

    #[test]
    fn test_br_on_null_keeps_label_operands() {
        let module = gc_module();
        let mut v = CodeValidator::new(&module, vec![]);
        v.push_frame(FrameKind::Block, vec![], vec![ValueType::I64]);
        v.validate(&I64Const { value: 1 }).unwrap();
        v.validate(&RefNull {
            heap: HeapType::Concrete(2),
        })
        .unwrap();
        v.validate(&BrOnNull { label_idx: 0 }).unwrap();
        assert_eq!(v.stack().height(), 2);
        assert_eq!(
            v.stack().peek(),
            Ok(Val(ValueType::Ref(RefType::non_null(HeapType::Concrete(2)))))
        );
        assert!(v.validate(&BrOnNull { label_idx: 2 }).is_err());
    }

    #[test]
    fn test_loop_labels_use_params() {
        let module = gc_module();
        let mut ctrls = ControlStack::default();
        let mut vals = OperandStack::new(&module.types);
        ctrls.push(&mut vals, FrameKind::Loop, vec![ValueType::F32], vec![ValueType::I64]);
        assert_eq!(ctrls.label_types(0).unwrap(), &[ValueType::F32]);
        assert_eq!(vals.height(), 1);
        assert!(ctrls.label_types(1).is_err());
        vals.pop_f32().unwrap();
        vals.push_i64();
        assert_eq!(ctrls.pop(&mut vals).unwrap().kind, FrameKind::Loop);
    }

    #[test]
    fn test_conversions_and_i31() {
        let module = gc_module();
        let non_null_extern = ValueType::Ref(RefType::non_null(HeapType::EXTERN));
        let mut v = CodeValidator::new(&module, vec![]);
        v.vals.push_type(non_null_extern);
        v.validate(&AnyConvertExtern).unwrap();
        assert_eq!(
            v.stack().peek(),
            Ok(Val(ValueType::Ref(RefType::non_null(HeapType::ANY))))
        );
        v.validate(&ExternConvertAny).unwrap();
        assert_eq!(v.stack().peek(), Ok(Val(non_null_extern)));

        assert_eq!(delta(&module, RefI31, &[ValueType::I32]), Some(0));
        let i31 = ValueType::Ref(RefType::non_null(HeapType::I31));
        assert_eq!(delta(&module, I31GetU, &[i31]), Some(0));
        assert!(delta(&module, I31GetS, &[ValueType::ANYREF]).is_none());
        assert_eq!(
            delta(&module, ArrayLen, &[array_ref(1)]),
            Some(0)
        );
        assert!(delta(&module, ArrayLen, &[ValueType::Ref(RefType::nullable(HeapType::Abstract(AbsHeapType::Struct)))]).is_none());
    }

    #[test]
    fn test_select() {
        let module = gc_module();
        let i32 = ValueType::I32;
        assert_eq!(delta(&module, Select, &[i32, i32, i32]), Some(-2));
        assert!(delta(&module, Select, &[ValueType::F32, i32, i32]).is_none());
        assert!(delta(&module, Select, &[ValueType::ANYREF, ValueType::ANYREF, i32]).is_none());
        assert_eq!(
            delta(
                &module,
                SelectTyped {
                    val_types: vec![ValueType::ANYREF]
                },
                &[ValueType::ANYREF, array_ref(0), i32]
            ),
            Some(-2)
        );
    }
}
