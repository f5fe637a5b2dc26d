//! Static schema descriptions.
//!
//! Rules are compiled against a closed schema: every record type lists its
//! fields (name, static type, accessor) in a table, and the root record type
//! additionally lists the helper functions rule authors may call. The
//! compiler resolves identifiers against these tables once; the interpreter
//! then reads fields by index.
//!
//! The engine is generic over the root type (`S: Schema`), with
//! `ItemSnapshot` as the stock schema. A richer root type only has to
//! implement `RecordType` and `Schema`.

use crate::error::EvalError;
use crate::value::Value;
use std::fmt;

/// Element type of a list.
///
/// Lists nest at most two levels deep (`string[][]` for mod sets,
/// `bool[][]` for condition sets), which is all the helper library needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElemType {
    Bool,
    Int,
    Float,
    Str,
    Record(RecordInfo),
    BoolList,
    IntList,
    FloatList,
    StrList,
}

impl ElemType {
    pub fn to_type(self) -> Type {
        match self {
            ElemType::Bool => Type::Bool,
            ElemType::Int => Type::Int,
            ElemType::Float => Type::Float,
            ElemType::Str => Type::Str,
            ElemType::Record(info) => Type::Record(info),
            ElemType::BoolList => Type::List(ElemType::Bool),
            ElemType::IntList => Type::List(ElemType::Int),
            ElemType::FloatList => Type::List(ElemType::Float),
            ElemType::StrList => Type::List(ElemType::Str),
        }
    }

    /// The element type that holds values of `ty`, if lists of it are expressible.
    pub fn from_type(ty: Type) -> Option<ElemType> {
        match ty {
            Type::Bool => Some(ElemType::Bool),
            Type::Int => Some(ElemType::Int),
            Type::Float => Some(ElemType::Float),
            Type::Str => Some(ElemType::Str),
            Type::Record(info) => Some(ElemType::Record(info)),
            Type::List(ElemType::Bool) => Some(ElemType::BoolList),
            Type::List(ElemType::Int) => Some(ElemType::IntList),
            Type::List(ElemType::Float) => Some(ElemType::FloatList),
            Type::List(ElemType::Str) => Some(ElemType::StrList),
            _ => None,
        }
    }
}

/// Static type of an expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Type {
    Bool,
    Int,
    Float,
    Str,
    Record(RecordInfo),
    List(ElemType),
    /// A modifier collection (`ModsInfo.ExplicitMods`, `FindMods(..)`).
    Mods,
    IntStats,
    FloatStats,
    /// `StringComparison.Ordinal` / `StringComparison.OrdinalIgnoreCase`.
    Comparison,
    /// A boolean lambda over one element of the given type.
    Predicate(ElemType),
}

impl Type {
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// Element type when iterated, for lists and modifier collections.
    pub fn element(self) -> Option<Type> {
        match self {
            Type::List(elem) => Some(elem.to_type()),
            Type::Mods => Some(Type::Record(RecordInfo::of::<crate::stats::ModifierEntry>())),
            _ => None,
        }
    }

    /// Whether a parameter of type `self` accepts an argument of type `arg`.
    ///
    /// Integers widen to floats, element-wise included.
    pub fn accepts(self, arg: Type) -> bool {
        match (self, arg) {
            (a, b) if a == b => true,
            (Type::Float, Type::Int) => true,
            (Type::List(ElemType::Float), Type::List(ElemType::Int)) => true,
            (Type::List(ElemType::FloatList), Type::List(ElemType::IntList)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "Boolean"),
            Type::Int => write!(f, "Int64"),
            Type::Float => write!(f, "Double"),
            Type::Str => write!(f, "String"),
            Type::Record(info) => write!(f, "{}", info.name),
            Type::List(elem) => write!(f, "{}[]", elem.to_type()),
            Type::Mods => write!(f, "ItemMod[]"),
            Type::IntStats => write!(f, "StatTable<Int64>"),
            Type::FloatStats => write!(f, "StatTable<Double>"),
            Type::Comparison => write!(f, "StringComparison"),
            Type::Predicate(elem) => write!(f, "Func<{}, Boolean>", elem.to_type()),
        }
    }
}

/// Type-erased handle to a record type's field table.
#[derive(Clone, Copy)]
pub struct RecordInfo {
    pub name: &'static str,
    lookup: fn(&str) -> Option<(usize, Type)>,
}

impl RecordInfo {
    pub const fn of<T: RecordType>() -> Self {
        RecordInfo {
            name: T::NAME,
            lookup: lookup_field::<T>,
        }
    }

    /// Field index and type for `name`, following aliases.
    pub fn field(&self, name: &str) -> Option<(usize, Type)> {
        (self.lookup)(name)
    }
}

impl PartialEq for RecordInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for RecordInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordInfo({})", self.name)
    }
}

fn lookup_field<T: RecordType>(name: &str) -> Option<(usize, Type)> {
    let name = T::aliases()
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, target)| *target);
    T::fields()
        .iter()
        .enumerate()
        .find(|(_, field)| field.name == name)
        .map(|(index, field)| (index, field.ty))
}

/// One named, typed field of a record.
pub struct Field<T: 'static> {
    pub name: &'static str,
    pub ty: Type,
    pub get: for<'a> fn(&'a T) -> Value<'a>,
}

/// A record type with a static field table.
pub trait RecordType: Sync + Sized + 'static {
    const NAME: &'static str;

    fn fields() -> &'static [Field<Self>];

    /// Alternative names, `(alias, field name)`.
    fn aliases() -> &'static [(&'static str, &'static str)] {
        &[]
    }
}

/// Object-safe view of a record used by the interpreter.
pub trait Record: Sync {
    fn type_name(&self) -> &'static str;

    /// Value of the field at `index` in the record's field table.
    fn field(&self, index: usize) -> Option<Value<'_>>;
}

impl<T: RecordType> Record for T {
    fn type_name(&self) -> &'static str {
        T::NAME
    }

    fn field(&self, index: usize) -> Option<Value<'_>> {
        T::fields().get(index).map(|field| (field.get)(self))
    }
}

/// A helper function callable from rules.
///
/// `params` are the fixed leading parameters. When `variadic` is set, any
/// number of trailing arguments of that type follow and reach `call` packed
/// into one list (a single array argument is passed through unchanged).
pub struct Helper<S: 'static> {
    pub name: &'static str,
    pub params: &'static [Type],
    pub variadic: Option<ElemType>,
    pub returns: Type,
    pub call: for<'a> fn(&'a S, Vec<Value<'a>>) -> Result<Value<'a>, EvalError>,
}

/// The root record type rules are compiled against.
pub trait Schema: RecordType {
    /// The helper library. Several entries may share a name (overloads).
    fn helpers() -> &'static [Helper<Self>];

    /// Enum namespaces usable as `Namespace.Member` string constants.
    fn enums() -> &'static [(&'static str, &'static [&'static str])] {
        &[]
    }

    /// Short identification of an instance for diagnostics.
    fn describe(&self) -> String;
}
