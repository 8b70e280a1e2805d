//! Message parsers must reject malformed input with an error, never panic.

use hdftree_format::attribute::AttributeMessage;
use hdftree_format::data_layout::DataLayout;
use hdftree_format::dataspace::Dataspace;
use hdftree_format::datatype::Datatype;
use hdftree_format::link_message::LinkMessage;
use hdftree_format::object_header::ObjectHeader;
use hdftree_format::superblock::Superblock;
use proptest::prelude::*;

proptest! {
    #[test]
    fn message_parsers_never_panic(data in proptest::collection::vec(any::<u8>(), 0..128)) {
        let _ = Dataspace::parse(&data, 8);
        let _ = Datatype::parse(&data);
        let _ = DataLayout::parse(&data, 8, 8);
        let _ = AttributeMessage::parse(&data, 8);
        let _ = LinkMessage::parse(&data, 8);
    }

    #[test]
    fn headers_never_panic(mut data in proptest::collection::vec(any::<u8>(), 8..256)) {
        data[..4].copy_from_slice(b"OHDR");
        data[4] = 2;
        let _ = ObjectHeader::parse(&data, 0, 8, 8);
        let _ = Superblock::parse(&data, 0);
    }
}
