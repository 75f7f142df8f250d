use tracing_test::traced_test;

use super::*;
use crate::{
    collection::SliceSerializer,
    error::ErrorKind,
    serializer::{Serializer, from_slice, to_vec},
};

type Shared = Option<Ptr<u32>>;

type Pointer = PointerSerializer<u32, Varint<u32>>;

fn shared_list() -> SliceSerializer<Shared, Pointer> {
    SliceSerializer::new(PointerSerializer::new(Varint::new()))
}

/// A list node whose tail may point back into the list.
struct Node {
    value: u32,
    next: Option<Ptr<Node>>,
}

#[derive(Debug, Clone, Copy)]
struct NodeSerializer;

const VALUE: Varint<u32> = Varint::new();

const NEXT: PointerSerializer<Node, NodeSerializer> =
    PointerSerializer::new(NodeSerializer);

impl Marshaler<Node> for NodeSerializer {
    fn marshal(
        &self,
        value: &Node,
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        let written = VALUE.marshal(&value.value, writer, session)?;
        let next = NEXT
            .marshal(&value.next, writer, session)
            .map_err(|e| e.offset_by(written))?;

        Ok(written + next)
    }
}

impl Unmarshaler<Node> for NodeSerializer {
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<(Node, usize)> {
        let (value, read) = VALUE.unmarshal(reader, session)?;
        let (next, next_len) =
            NEXT.unmarshal(reader, session).map_err(|e| e.offset_by(read))?;

        Ok((Node { value, next }, read + next_len))
    }
}

impl Sizer<Node> for NodeSerializer {
    fn size(&self, value: &Node, session: &mut Session) -> usize {
        VALUE.size(&value.value, session) + NEXT.size(&value.next, session)
    }
}

impl Skipper for NodeSerializer {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        let read = VALUE.skip(reader, session)?;
        let next_len =
            NEXT.skip(reader, session).map_err(|e| e.offset_by(read))?;

        Ok(read + next_len)
    }
}

fn assert_consistent<T, S>(serializer: &S, value: &T) -> Vec<u8>
where
    S: Serializer<T>,
{
    let bytes = to_vec(serializer, value).unwrap();
    assert_eq!(serializer.size(value, &mut Session::new()), bytes.len());

    let mut reader: &[u8] = &bytes;
    assert_eq!(
        serializer.skip(&mut reader, &mut Session::new()).unwrap(),
        bytes.len()
    );
    assert!(reader.is_empty());

    bytes
}

#[test]
fn nil_is_a_single_byte() {
    let codec = PointerSerializer::new(Varint::new());

    let bytes = assert_consistent(&codec, &None::<Ptr<u32>>);
    assert_eq!(bytes, [0x00]);

    let (decoded, read): (Shared, usize) = from_slice(&codec, &bytes).unwrap();
    assert!(decoded.is_none());
    assert_eq!(read, 1);
}

#[test]
fn repeated_pointer_is_written_once() {
    let shared = Ptr::new(5u32);
    let value = vec![Some(shared.clone()), None, Some(shared)];

    let bytes = assert_consistent(&shared_list(), &value);
    assert_eq!(bytes, [0x03, 0x01, 0x01, 0x05, 0x00, 0x01, 0x01]);

    let (decoded, read): (Vec<Shared>, usize) =
        from_slice(&shared_list(), &bytes).unwrap();
    assert_eq!(read, bytes.len());

    let first = decoded[0].as_ref().unwrap();
    let last = decoded[2].as_ref().unwrap();
    assert!(first.ptr_eq(last));
    assert_eq!(first.get().as_deref(), Some(&5));
    assert!(decoded[1].is_none());
}

#[test]
fn equal_values_in_distinct_allocations_stay_distinct() {
    let value = vec![Some(Ptr::new(5u32)), Some(Ptr::new(5u32))];

    let bytes = assert_consistent(&shared_list(), &value);
    assert_eq!(bytes, [0x02, 0x01, 0x01, 0x05, 0x01, 0x02, 0x05]);

    let (decoded, _): (Vec<Shared>, usize) =
        from_slice(&shared_list(), &bytes).unwrap();
    let [Some(a), Some(b)] = decoded.as_slice() else {
        panic!("expected two pointers");
    };
    assert!(!a.ptr_eq(b));
    assert_eq!(a.get().as_deref(), b.get().as_deref());
}

#[test]
#[traced_test]
fn self_cycle_roundtrip() {
    let node = Ptr::empty();
    assert!(node.set(Node { value: 9, next: Some(node.clone()) }).is_ok());
    let value = Some(node);

    let bytes = assert_consistent(&NEXT, &value);
    assert_eq!(bytes, [0x01, 0x01, 0x09, 0x01, 0x01]);

    let (decoded, read): (Option<Ptr<Node>>, usize) =
        from_slice(&NEXT, &bytes).unwrap();
    assert_eq!(read, bytes.len());

    let decoded = decoded.unwrap();
    let inner = decoded.get().unwrap();
    assert_eq!(inner.value, 9);
    assert!(inner.next.as_ref().unwrap().ptr_eq(&decoded));

    assert!(logs_contain("registered placeholder for pointer 1"));
}

#[test]
fn two_node_cycle_roundtrip() {
    let a = Ptr::empty();
    let b = Ptr::new(Node { value: 2, next: Some(a.clone()) });
    assert!(a.set(Node { value: 1, next: Some(b.clone()) }).is_ok());

    let bytes = assert_consistent(&NEXT, &Some(a));
    assert_eq!(bytes, [0x01, 0x01, 0x01, 0x01, 0x02, 0x02, 0x01, 0x01]);

    let (decoded, _): (Option<Ptr<Node>>, usize) =
        from_slice(&NEXT, &bytes).unwrap();
    let a = decoded.unwrap();
    let b = a.get().unwrap().next.clone().unwrap();

    assert_eq!(b.get().unwrap().value, 2);
    assert!(b.get().unwrap().next.as_ref().unwrap().ptr_eq(&a));
}

#[test]
fn taking_a_decoded_self_cycle_releases_it() {
    let (decoded, _): (Option<Ptr<Node>>, usize) =
        from_slice(&NEXT, &[0x01, 0x01, 0x09, 0x01, 0x01]).unwrap();
    let node = decoded.unwrap();

    // the node holds a handle to itself
    assert_eq!(node.handle_count(), 2);

    let taken = node.take().unwrap();
    assert_eq!(taken.value, 9);
    assert!(node.get().is_none());

    drop(taken);
    assert_eq!(node.handle_count(), 1);
}

#[test]
fn taking_the_root_releases_a_longer_cycle() {
    let bytes = [0x01, 0x01, 0x01, 0x01, 0x02, 0x02, 0x01, 0x01];
    let (decoded, _): (Option<Ptr<Node>>, usize) =
        from_slice(&NEXT, &bytes).unwrap();
    let a = decoded.unwrap();
    assert_eq!(a.handle_count(), 2);

    drop(a.take());
    assert_eq!(a.handle_count(), 1);
}

#[test]
fn set_fills_only_an_empty_pointer() {
    let ptr = Ptr::empty();
    assert_eq!(ptr.set(1u32), Ok(()));
    assert_eq!(ptr.set(2), Err(2));

    assert_eq!(ptr.take(), Some(1));
    assert_eq!(ptr.set(3), Ok(()));
    assert_eq!(ptr.get().as_deref(), Some(&3));
}

#[test]
fn unknown_tag_is_a_format_error() {
    let codec = PointerSerializer::<u32, _>::new(Varint::new());

    let error = from_slice::<Shared, _>(&codec, &[0x02, 0x01]).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::WrongFormat(_)));
    assert_eq!(error.bytes(), 1);

    let mut reader: &[u8] = &[0x02, 0x01];
    let error = codec.skip(&mut reader, &mut Session::new()).unwrap_err();
    assert!(error.is_format());
    assert_eq!(error.bytes(), 1);
}

#[test]
fn unset_pointer_cannot_be_marshalled() {
    let mut buffer = Vec::new();
    let error = PointerSerializer::new(Varint::new())
        .marshal(&Some(Ptr::<u32>::empty()), &mut buffer, &mut Session::new())
        .unwrap_err();

    assert!(matches!(error.kind(), ErrorKind::WrongFormat(_)));
    assert_eq!(error.bytes(), 0);
    assert!(buffer.is_empty());
}

#[test]
fn id_registered_for_another_type_is_a_format_error() {
    let mut session = Session::new();

    let mut reader: &[u8] = &[0x01, 0x01, 0x05];
    let (first, _): (Shared, usize) = PointerSerializer::new(Varint::new())
        .unmarshal(&mut reader, &mut session)
        .unwrap();
    assert!(first.is_some());

    let mut reader: &[u8] = &[0x01, 0x01];
    let error = PointerSerializer::<u64, _>::new(Varint::new())
        .unmarshal(&mut reader, &mut session)
        .map(|(value, _): (Option<Ptr<u64>>, usize)| value)
        .unwrap_err();

    assert!(matches!(error.kind(), ErrorKind::WrongFormat(_)));
    assert_eq!(error.bytes(), 2);
}

#[test]
fn skip_marks_the_id_as_seen() {
    let codec = PointerSerializer::<u32, _>::new(Varint::new());
    let mut session = Session::new();

    let mut reader: &[u8] = &[0x01, 0x01, 0x05, 0x01, 0x01, 0x01, 0x01];
    assert_eq!(codec.skip(&mut reader, &mut session).unwrap(), 3);

    // a repeated id consumes nothing past the id
    assert_eq!(codec.skip(&mut reader, &mut session).unwrap(), 2);

    // an id only ever skipped decodes as nil
    let (decoded, read): (Shared, usize) =
        codec.unmarshal(&mut reader, &mut session).unwrap();
    assert!(decoded.is_none());
    assert_eq!(read, 2);
    assert!(reader.is_empty());
}

#[test]
fn payload_errors_include_the_header() {
    let codec = PointerSerializer::<u16, _>::new(Varint::new());
    let bytes = [0x01, 0x01, 0xFF, 0xFF, 0x04];

    let error = from_slice::<Option<Ptr<u16>>, _>(&codec, &bytes).unwrap_err();

    assert!(matches!(error.kind(), ErrorKind::Overflow("u16")));
    assert_eq!(error.bytes(), 5);
}

#[test]
fn debug_does_not_follow_the_pointer() {
    let node = Ptr::empty();
    assert!(node.set(Node { value: 1, next: Some(node.clone()) }).is_ok());

    let rendered = format!("{node:?}");
    assert!(rendered.starts_with("Ptr {"));
    assert!(rendered.contains("set: true"));
}
