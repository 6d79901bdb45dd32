//! Value generators for identifier attributes.
//!
//! Generators are looked up by name in a static table. Construction validates
//! the arguments, so an unknown generator or a stray option fails when the
//! spec is loaded rather than on first use.
//!
//! | name             | arguments  | values                        |
//! |------------------|------------|-------------------------------|
//! | `unique_integer` | -          | `"7"`, `"3"`, ..., `"42"`     |
//! | `unique_string`  | `prefix`   | `"S-7"`, `"S-3"`, ...         |
//! | `uuid`           | -          | random v4 UUIDs               |

use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;

use super::{IdentifierError, IdentifierResult};

/// Extra generator options taken from an attribute declaration.
pub type GeneratorArgs = BTreeMap<String, Value>;

/// Produces attribute values. Implementations must never repeat a value.
pub trait IdGenerator: fmt::Debug {
    fn next_value(&mut self) -> String;
}

type Constructor = fn(&str, &GeneratorArgs, StdRng) -> IdentifierResult<Box<dyn IdGenerator>>;

static GENERATORS: &[(&str, Constructor)] = &[
    ("unique_integer", unique_integer),
    ("unique_string", unique_string),
    ("uuid", uuid_generator),
];

/// Names of all known generators.
pub fn generator_names() -> impl Iterator<Item = &'static str> {
    GENERATORS.iter().map(|(name, _)| *name)
}

/// Build the generator registered under `name`.
pub fn build_generator(
    name: &str,
    args: &GeneratorArgs,
    rng: StdRng,
) -> IdentifierResult<Box<dyn IdGenerator>> {
    let (_, constructor) = GENERATORS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .ok_or_else(|| IdentifierError::UnknownGenerator {
            generator: name.to_string(),
            known: generator_names().collect::<Vec<_>>().join(", "),
        })?;
    constructor(name, args, rng)
}

fn unique_integer(
    name: &str,
    args: &GeneratorArgs,
    rng: StdRng,
) -> IdentifierResult<Box<dyn IdGenerator>> {
    accept_only(name, args, &[])?;
    Ok(Box::new(UniqueIdGenerator::new("", rng)))
}

fn unique_string(
    name: &str,
    args: &GeneratorArgs,
    rng: StdRng,
) -> IdentifierResult<Box<dyn IdGenerator>> {
    accept_only(name, args, &["prefix"])?;
    let prefix = match args.get("prefix") {
        None => String::new(),
        Some(Value::String(prefix)) => prefix.clone(),
        Some(other) => {
            return Err(IdentifierError::InvalidGeneratorArguments {
                generator: name.to_string(),
                reason: format!("prefix must be a string, got {}", other),
            })
        }
    };
    Ok(Box::new(UniqueIdGenerator::new(prefix, rng)))
}

fn uuid_generator(
    name: &str,
    args: &GeneratorArgs,
    rng: StdRng,
) -> IdentifierResult<Box<dyn IdGenerator>> {
    accept_only(name, args, &[])?;
    Ok(Box::new(UuidGenerator { rng }))
}

fn accept_only(generator: &str, args: &GeneratorArgs, accepted: &[&str]) -> IdentifierResult<()> {
    let unexpected: Vec<&str> = args
        .keys()
        .map(String::as_str)
        .filter(|key| !accepted.contains(key))
        .collect();
    if unexpected.is_empty() {
        return Ok(());
    }
    Err(IdentifierError::InvalidGeneratorArguments {
        generator: generator.to_string(),
        reason: format!("unexpected arguments: {}", unexpected.join(", ")),
    })
}

/// Issues integers without repetition, in shuffled order.
///
/// Integers are drawn from a pool covering one decade of digits at a time
/// (1–9, then 10–99, then 100–999, ...). The pool is shuffled when filled and
/// values are popped from it; an exhausted pool is refilled with the next
/// decade, so no value is ever issued twice.
///
/// Each pool is fully materialized: the seven-digit decade holds 9 million
/// values (about 72 MB) and the eight-digit one about 720 MB, so this suits
/// test-sized data of up to a few million values per attribute.
#[derive(Debug)]
pub struct UniqueIdGenerator {
    prefix: String,
    digits: u32,
    pool: Vec<u64>,
    rng: StdRng,
}

impl UniqueIdGenerator {
    pub fn new(prefix: impl Into<String>, rng: StdRng) -> Self {
        let mut generator = Self {
            prefix: prefix.into(),
            digits: 0,
            pool: Vec::new(),
            rng,
        };
        generator.refill();
        generator
    }

    fn refill(&mut self) {
        self.digits += 1;
        let low = 10u64.pow(self.digits - 1);
        let high = 10u64.pow(self.digits);
        self.pool = (low..high).collect();
        self.pool.shuffle(&mut self.rng);
    }
}

impl IdGenerator for UniqueIdGenerator {
    fn next_value(&mut self) -> String {
        let value = loop {
            match self.pool.pop() {
                Some(value) => break value,
                None => self.refill(),
            }
        };
        format!("{}{}", self.prefix, value)
    }
}

/// Random v4 UUIDs drawn from the generator's own rng.
#[derive(Debug)]
pub struct UuidGenerator {
    rng: StdRng,
}

impl UuidGenerator {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }
}

impl IdGenerator for UuidGenerator {
    fn next_value(&mut self) -> String {
        random_uuid(&mut self.rng)
    }
}

/// A v4 UUID built from `rng`, so seeded runs repeat exactly.
pub(crate) fn random_uuid(rng: &mut StdRng) -> String {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}
