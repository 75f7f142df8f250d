//! Shared value types and hand-written codecs for strand integration tests.
//!
//! This crate provides the types used across integration tests and benches.

#![allow(missing_docs)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

use strand_serialize::{
    Composite, MarshalFn, Marshaler, MaxLength, PointerSerializer, Ptr,
    Reader, Result, Serializer, Session, SizeFn, Sizer, SkipFn, Skipper,
    SliceSerializer, StringSerializer, UnmarshalFn, Unmarshaler, Varint,
    Wrapper, Writer,
};

// ============================================================================
// People (shared and cyclic graphs)
// ============================================================================

/// A person who may be friends with other people, themselves included.
#[derive(Debug)]
pub struct Person {
    pub name: String,
    pub age: u32,
    pub friends: Vec<Option<Ptr<Person>>>,
}

impl Person {
    pub fn new(name: &str, age: u32) -> Self {
        Self { name: name.to_owned(), age, friends: Vec::new() }
    }

    /// Returns the friend at `index`, panicking if it is nil.
    pub fn friend(&self, index: usize) -> &Ptr<Self> {
        self.friends[index].as_ref().expect("friend is nil")
    }
}

/// Allocates a person whose friend list is filled by `friends` once the
/// pointer exists, so the list can refer back to the person.
pub fn person_with(
    name: &str,
    age: u32,
    friends: impl FnOnce(&Ptr<Person>) -> Vec<Option<Ptr<Person>>>,
) -> Ptr<Person> {
    let person = Ptr::empty();
    let friends = friends(&person);

    if person.set(Person { friends, ..Person::new(name, age) }).is_err() {
        unreachable!("a fresh pointer is empty");
    }

    person
}

/// Codec for [`Person`]: name, age, then the friend pointers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonSerializer;

type Friend = PointerSerializer<Person, PersonSerializer>;

const AGE: Varint<u32> = Varint::new();

fn friends() -> SliceSerializer<Option<Ptr<Person>>, Friend> {
    SliceSerializer::new(PointerSerializer::new(PersonSerializer))
}

impl Marshaler<Person> for PersonSerializer {
    fn marshal(
        &self,
        value: &Person,
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        let mut written =
            StringSerializer::new().marshal(&value.name, writer, session)?;
        written += AGE
            .marshal(&value.age, writer, session)
            .map_err(|e| e.offset_by(written))?;
        written += friends()
            .marshal(&value.friends, writer, session)
            .map_err(|e| e.offset_by(written))?;

        Ok(written)
    }
}

impl Unmarshaler<Person> for PersonSerializer {
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<(Person, usize)> {
        let (name, mut read) =
            StringSerializer::new().unmarshal(reader, session)?;
        let (age, age_len) =
            AGE.unmarshal(reader, session).map_err(|e| e.offset_by(read))?;
        read += age_len;
        let (friends, friends_len) = friends()
            .unmarshal(reader, session)
            .map_err(|e| e.offset_by(read))?;
        read += friends_len;

        Ok((Person { name, age, friends }, read))
    }
}

impl Sizer<Person> for PersonSerializer {
    fn size(&self, value: &Person, session: &mut Session) -> usize {
        StringSerializer::new().size(&value.name, session)
            + AGE.size(&value.age, session)
            + friends().size(&value.friends, session)
    }
}

impl Skipper for PersonSerializer {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        let mut read = StringSerializer::new().skip(reader, session)?;
        read += AGE.skip(reader, session).map_err(|e| e.offset_by(read))?;
        read += friends()
            .skip(reader, session)
            .map_err(|e| e.offset_by(read))?;

        Ok(read)
    }
}

/// A wrapped codec for a nullable [`Person`] pointer.
pub fn people() -> Wrapper<PointerSerializer<Person, PersonSerializer>> {
    Wrapper::new(PointerSerializer::new(PersonSerializer))
}

// ============================================================================
// Pairs (aliasing fields)
// ============================================================================

/// Two labels that may be the same allocation.
#[derive(Debug, Clone)]
pub struct Pair {
    pub left: Option<Ptr<String>>,
    pub right: Option<Ptr<String>>,
}

fn label() -> PointerSerializer<String, StringSerializer> {
    PointerSerializer::new(StringSerializer::new())
}

fn marshal_pair(
    value: &Pair,
    writer: &mut dyn Writer,
    session: &mut Session,
) -> Result<usize> {
    let written = label().marshal(&value.left, writer, session)?;
    let right = label()
        .marshal(&value.right, writer, session)
        .map_err(|e| e.offset_by(written))?;

    Ok(written + right)
}

fn unmarshal_pair(
    reader: &mut dyn Reader,
    session: &mut Session,
) -> Result<(Pair, usize)> {
    let (left, read) = label().unmarshal(reader, session)?;
    let (right, right_len) =
        label().unmarshal(reader, session).map_err(|e| e.offset_by(read))?;

    Ok((Pair { left, right }, read + right_len))
}

fn size_pair(value: &Pair, session: &mut Session) -> usize {
    label().size(&value.left, session) + label().size(&value.right, session)
}

fn skip_pair(reader: &mut dyn Reader, session: &mut Session) -> Result<usize> {
    let read = label().skip(reader, session)?;
    let right = label().skip(reader, session).map_err(|e| e.offset_by(read))?;

    Ok(read + right)
}

/// Codec for [`Pair`], assembled from four free functions.
pub fn pair_serializer() -> impl Serializer<Pair> {
    Composite {
        marshal: MarshalFn(marshal_pair),
        unmarshal: UnmarshalFn(unmarshal_pair),
        size: SizeFn(size_pair),
        skip: SkipFn(skip_pair),
    }
}

// ============================================================================
// Readings (validated records in a stream)
// ============================================================================

/// A batch of samples from one sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub sensor: String,
    pub samples: Vec<i32>,
}

impl Reading {
    pub fn new(sensor: &str, samples: &[i32]) -> Self {
        Self { sensor: sensor.to_owned(), samples: samples.to_vec() }
    }
}

/// Codec for [`Reading`] that rejects long sensor names and large batches.
///
/// A rejected reading is consumed entirely, so the next reading in the
/// stream can still be decoded.
#[derive(Debug)]
pub struct ReadingSerializer {
    sensor: StringSerializer,
    samples: SliceSerializer<i32, Varint<i32>>,
}

impl ReadingSerializer {
    pub fn new(max_sensor_len: usize, max_samples: usize) -> Self {
        Self {
            sensor: StringSerializer::new()
                .with_length_validator(MaxLength(max_sensor_len))
                .skip_rejected(true),
            samples: SliceSerializer::new(Varint::new())
                .with_length_validator(MaxLength(max_samples))
                .recover_with(Varint::<i32>::new()),
        }
    }
}

impl Marshaler<Reading> for ReadingSerializer {
    fn marshal(
        &self,
        value: &Reading,
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        let written = self.sensor.marshal(&value.sensor, writer, session)?;
        let samples = self
            .samples
            .marshal(&value.samples, writer, session)
            .map_err(|e| e.offset_by(written))?;

        Ok(written + samples)
    }
}

impl Unmarshaler<Reading> for ReadingSerializer {
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<(Reading, usize)> {
        let (sensor, read) = match self.sensor.unmarshal(reader, session) {
            Ok(decoded) => decoded,
            Err(error) if error.is_validation() => {
                // the samples of a rejected reading are still ahead
                let sensor_len = error.bytes();
                let skipped = self
                    .samples
                    .skip(reader, session)
                    .map_err(|e| e.offset_by(sensor_len))?;
                return Err(error.offset_by(skipped));
            }
            Err(error) => return Err(error),
        };

        let (samples, samples_len) = self
            .samples
            .unmarshal(reader, session)
            .map_err(|e| e.offset_by(read))?;

        Ok((Reading { sensor, samples }, read + samples_len))
    }
}

impl Sizer<Reading> for ReadingSerializer {
    fn size(&self, value: &Reading, session: &mut Session) -> usize {
        self.sensor.size(&value.sensor, session)
            + self.samples.size(&value.samples, session)
    }
}

impl Skipper for ReadingSerializer {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        let read = self.sensor.skip(reader, session)?;
        let samples =
            self.samples.skip(reader, session).map_err(|e| e.offset_by(read))?;

        Ok(read + samples)
    }
}
