use super::*;

/// The three bytes that mark an envelope as an ordinals inscription.
pub const PROTOCOL_ID: [u8; 3] = *b"ord";

pub(crate) const BODY_TAG: [u8; 0] = [];

type Result<T> = std::result::Result<T, script::Error>;
pub(crate) type RawEnvelope = Envelope<Vec<Vec<u8>>>;
pub type ParsedEnvelope = Envelope<Inscription>;

/// One `OP_0 OP_IF "ord" … OP_ENDIF` framing recovered from a script.
///
/// `pushnum` records that the payload used small-integer opcodes instead
/// of byte pushes, `stutter` that the framing was preceded by a spurious
/// `OP_0`. Either marks the resulting inscription as cursed.
#[derive(Default, PartialEq, Clone, Serialize, Deserialize, Debug, Eq)]
pub struct Envelope<T> {
  pub input: u32,
  pub offset: u32,
  pub payload: T,
  pub pushnum: bool,
  pub stutter: bool,
}

#[derive(Debug, PartialEq, Error)]
pub enum Error {
  #[error("witness has {0} elements, expected 3")]
  WitnessShape(usize),
  #[error("malformed script: {0}")]
  Script(script::Error),
}

/// Extracts the inscriptions carried by `script`.
///
/// In non-strict mode the parser recovers whatever envelopes it can and
/// marks inscriptions whose recovery required non-canonical ops as
/// cursed; it returns `None` only when the script bytes themselves do not
/// parse. In strict mode any deviation from the reveal-script shape
/// yields `None`.
pub fn parse_inscriptions(script: &Script, strict: bool) -> Option<Vec<Inscription>> {
  if strict {
    OrdinalReveal::recognize(script).map(|reveal| reveal.inscriptions)
  } else {
    Some(
      RawEnvelope::from_script(script)
        .ok()?
        .into_iter()
        .map(|envelope| ParsedEnvelope::from(envelope).payload)
        .collect(),
    )
  }
}

/// Extracts inscriptions from a script-path spend witness, which must
/// have exactly three elements: signature, leaf script, control block.
pub fn parse_witness(witness: &Witness) -> std::result::Result<Vec<Inscription>, Error> {
  if witness.len() != 3 {
    return Err(Error::WitnessShape(witness.len()));
  }

  RawEnvelope::from_script(Script::from_bytes(witness.nth(1).unwrap_or_default()))
    .map_err(Error::Script)
    .map(|envelopes| {
      envelopes
        .into_iter()
        .map(|envelope| ParsedEnvelope::from(envelope).payload)
        .collect()
    })
}

impl From<RawEnvelope> for ParsedEnvelope {
  fn from(envelope: RawEnvelope) -> Self {
    let body = envelope
      .payload
      .iter()
      .enumerate()
      .position(|(i, push)| i % 2 == 0 && push.is_empty());

    let mut fields: BTreeMap<&[u8], Vec<&[u8]>> = BTreeMap::new();
    let mut unknown = Vec::new();

    for item in envelope.payload[..body.unwrap_or(envelope.payload.len())].chunks(2) {
      if let [key, value] = item {
        if Tag::from_bytes(key).is_some() {
          fields.entry(key).or_default().push(value);
        } else {
          unknown.push((key.clone(), value.clone()));
        }
      }
    }

    let content_encoding = Tag::ContentEncoding.take(&mut fields);
    let content_type = Tag::ContentType.take(&mut fields);
    let delegate = Tag::Delegate.take(&mut fields);
    let metadata = Tag::Metadata.take(&mut fields);
    let metaprotocol = Tag::Metaprotocol.take(&mut fields);
    let note = Tag::Note.take(&mut fields);
    let parents = Tag::Parent.take_array(&mut fields);
    let pointer = Tag::Pointer.take(&mut fields);
    let rune = Tag::Rune.take(&mut fields);

    Self {
      payload: Inscription {
        body: body
          .map(|i| {
            envelope.payload[i + 1..]
              .iter()
              .flatten()
              .copied()
              .collect()
          })
          .unwrap_or_default(),
        content_encoding,
        content_type,
        cursed: envelope.pushnum || envelope.stutter,
        delegate,
        metadata,
        metaprotocol,
        note,
        parents,
        pointer,
        rune,
        unknown,
      },
      input: envelope.input,
      offset: envelope.offset,
      pushnum: envelope.pushnum,
      stutter: envelope.stutter,
    }
  }
}

impl ParsedEnvelope {
  /// Collects the envelopes revealed by every input's taproot leaf
  /// script. Key-path spends and annexes are skipped.
  pub fn from_transaction(transaction: &Transaction) -> Vec<Self> {
    RawEnvelope::from_transaction(transaction)
      .into_iter()
      .map(|envelope| envelope.into())
      .collect()
  }
}

impl RawEnvelope {
  pub(crate) fn from_transaction(transaction: &Transaction) -> Vec<Self> {
    let mut envelopes = Vec::new();

    for (i, input) in transaction.input.iter().enumerate() {
      if let Some(tapscript) = input.witness.tapscript() {
        if let Ok(input_envelopes) = Self::from_tapscript(tapscript, i) {
          envelopes.extend(input_envelopes);
        }
      }
    }

    envelopes
  }

  pub(crate) fn from_script(script: &Script) -> Result<Vec<Self>> {
    Self::from_tapscript(script, 0)
  }

  fn from_tapscript(tapscript: &Script, input: usize) -> Result<Vec<Self>> {
    let mut envelopes = Vec::new();

    let mut instructions = tapscript.instructions().peekable();

    let mut stuttered = false;
    while let Some(instruction) = instructions.next().transpose()? {
      if instruction == Instruction::PushBytes((&[]).into()) {
        let (stutter, envelope) =
          Self::from_instructions(&mut instructions, input, envelopes.len(), stuttered)?;
        if let Some(envelope) = envelope {
          envelopes.push(envelope);
        } else {
          stuttered = stutter;
        }
      }
    }

    Ok(envelopes)
  }

  fn accept(instructions: &mut Peekable<Instructions>, instruction: Instruction) -> Result<bool> {
    if instructions.peek() == Some(&Ok(instruction)) {
      instructions.next().transpose()?;
      Ok(true)
    } else {
      Ok(false)
    }
  }

  fn from_instructions(
    instructions: &mut Peekable<Instructions>,
    input: usize,
    offset: usize,
    stutter: bool,
  ) -> Result<(bool, Option<Self>)> {
    if !Self::accept(instructions, Instruction::Op(opcodes::all::OP_IF))? {
      let stutter = instructions.peek() == Some(&Ok(Instruction::PushBytes((&[]).into())));
      return Ok((stutter, None));
    }

    if !Self::accept(instructions, Instruction::PushBytes((&PROTOCOL_ID).into()))? {
      let stutter = instructions.peek() == Some(&Ok(Instruction::PushBytes((&[]).into())));
      return Ok((stutter, None));
    }

    let mut pushnum = false;

    let mut payload = Vec::new();

    loop {
      match instructions.next().transpose()? {
        None => return Ok((false, None)),
        Some(Instruction::Op(opcodes::all::OP_ENDIF)) => {
          return Ok((
            false,
            Some(Envelope {
              input: input.try_into().unwrap(),
              offset: offset.try_into().unwrap(),
              payload,
              pushnum,
              stutter,
            }),
          ));
        }
        Some(Instruction::Op(opcodes::all::OP_PUSHNUM_NEG1)) => {
          pushnum = true;
          payload.push(vec![0x81]);
        }
        Some(Instruction::Op(op))
          if (opcodes::all::OP_PUSHNUM_1.to_u8()..=opcodes::all::OP_PUSHNUM_16.to_u8())
            .contains(&op.to_u8()) =>
        {
          pushnum = true;
          payload.push(vec![op.to_u8() - opcodes::all::OP_PUSHNUM_1.to_u8() + 1]);
        }
        Some(Instruction::PushBytes(push)) => {
          payload.push(push.as_bytes().to_vec());
        }
        Some(_) => return Ok((false, None)),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    bitcoin::{
      blockdata::locktime::absolute::LockTime, transaction::Version, OutPoint, Sequence, TxIn,
    },
    pretty_assertions::assert_eq,
  };

  fn parse(script: &Script) -> Vec<ParsedEnvelope> {
    RawEnvelope::from_script(script)
      .unwrap_or_default()
      .into_iter()
      .map(|envelope| envelope.into())
      .collect()
  }

  #[test]
  fn empty_script() {
    assert_eq!(parse(&ScriptBuf::new()), Vec::new());
  }

  #[test]
  fn envelope_alone() {
    assert_eq!(
      parse(&envelope(&[&PROTOCOL_ID])),
      vec![ParsedEnvelope { ..default() }],
    );
  }

  #[test]
  fn with_content_type() {
    assert_eq!(
      parse(&envelope(&[
        &PROTOCOL_ID,
        &[1],
        b"text/plain;charset=utf-8",
        &[],
        b"ord",
      ])),
      vec![ParsedEnvelope {
        payload: inscription("text/plain;charset=utf-8", "ord"),
        ..default()
      }],
    );
  }

  #[test]
  fn with_content_encoding() {
    assert_eq!(
      parse(&envelope(&[
        &PROTOCOL_ID,
        &[1],
        b"text/plain;charset=utf-8",
        &[9],
        b"br",
        &[],
        b"ord",
      ])),
      vec![ParsedEnvelope {
        payload: Inscription {
          content_encoding: Some(b"br".to_vec()),
          ..inscription("text/plain;charset=utf-8", "ord")
        },
        ..default()
      }],
    );
  }

  #[test]
  fn unknown_tags_are_preserved_verbatim() {
    assert_eq!(
      parse(&envelope(&[
        &PROTOCOL_ID,
        &[255],
        b"foo",
        &[66],
        b"bar",
        &[],
        b"ord",
      ])),
      vec![ParsedEnvelope {
        payload: Inscription {
          unknown: vec![(vec![255], b"foo".to_vec()), (vec![66], b"bar".to_vec())],
          body: b"ord".to_vec(),
          ..default()
        },
        ..default()
      }],
    );
  }

  #[test]
  fn no_body_yields_an_empty_body() {
    assert_eq!(
      parse(&envelope(&[&PROTOCOL_ID, &[1], b"text/plain;charset=utf-8"])),
      vec![ParsedEnvelope {
        payload: Inscription {
          content_type: Some(b"text/plain;charset=utf-8".to_vec()),
          ..default()
        },
        ..default()
      }],
    );
  }

  #[test]
  fn valid_body_in_multiple_pushes_is_concatenated() {
    assert_eq!(
      parse(&envelope(&[
        &PROTOCOL_ID,
        &[1],
        b"text/plain;charset=utf-8",
        &[],
        b"foo",
        b"bar",
      ])),
      vec![ParsedEnvelope {
        payload: inscription("text/plain;charset=utf-8", "foobar"),
        ..default()
      }],
    );
  }

  #[test]
  fn valid_body_in_zero_and_empty_pushes() {
    assert_eq!(
      parse(&envelope(&[
        &PROTOCOL_ID,
        &[1],
        b"text/plain;charset=utf-8",
        &[],
      ])),
      vec![ParsedEnvelope {
        payload: inscription("text/plain;charset=utf-8", ""),
        ..default()
      }],
    );

    assert_eq!(
      parse(&envelope(&[
        &PROTOCOL_ID,
        &[1],
        b"text/plain;charset=utf-8",
        &[],
        &[],
        &[],
      ])),
      vec![ParsedEnvelope {
        payload: inscription("text/plain;charset=utf-8", ""),
        ..default()
      }],
    );
  }

  #[test]
  fn valid_ignore_trailing() {
    let script = script::Builder::new()
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(opcodes::all::OP_IF)
      .push_slice(PROTOCOL_ID)
      .push_slice([1])
      .push_slice(b"text/plain;charset=utf-8")
      .push_slice([])
      .push_slice(b"ord")
      .push_opcode(opcodes::all::OP_ENDIF)
      .push_opcode(opcodes::all::OP_CHECKSIG)
      .into_script();

    assert_eq!(
      parse(&script),
      vec![ParsedEnvelope {
        payload: inscription("text/plain;charset=utf-8", "ord"),
        ..default()
      }],
    );
  }

  #[test]
  fn valid_ignore_preceding() {
    let script = script::Builder::new()
      .push_opcode(opcodes::all::OP_CHECKSIG)
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(opcodes::all::OP_IF)
      .push_slice(PROTOCOL_ID)
      .push_slice([1])
      .push_slice(b"text/plain;charset=utf-8")
      .push_slice([])
      .push_slice(b"ord")
      .push_opcode(opcodes::all::OP_ENDIF)
      .into_script();

    assert_eq!(
      parse(&script),
      vec![ParsedEnvelope {
        payload: inscription("text/plain;charset=utf-8", "ord"),
        ..default()
      }],
    );
  }

  #[test]
  fn multiple_inscriptions_in_a_single_script() {
    let mut builder = script::Builder::new();
    builder = inscription("text/plain;charset=utf-8", "foo").append_reveal_script_to_builder(builder);
    builder = inscription("text/plain;charset=utf-8", "bar").append_reveal_script_to_builder(builder);

    assert_eq!(
      parse(&builder.into_script()),
      vec![
        ParsedEnvelope {
          payload: inscription("text/plain;charset=utf-8", "foo"),
          ..default()
        },
        ParsedEnvelope {
          payload: inscription("text/plain;charset=utf-8", "bar"),
          offset: 1,
          ..default()
        },
      ],
    );
  }

  #[test]
  fn unparsable_scripts_yield_nothing() {
    let mut script_bytes = envelope(&[&PROTOCOL_ID]).into_bytes();
    script_bytes.push(0x01);

    assert!(RawEnvelope::from_script(Script::from_bytes(&script_bytes)).is_err());
    assert_eq!(
      parse_inscriptions(Script::from_bytes(&script_bytes), false),
      None,
    );
  }

  #[test]
  fn no_endif() {
    let script = script::Builder::new()
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(opcodes::all::OP_IF)
      .push_slice(PROTOCOL_ID)
      .into_script();

    assert_eq!(parse(&script), Vec::new());
  }

  #[test]
  fn no_op_false() {
    let script = script::Builder::new()
      .push_opcode(opcodes::all::OP_IF)
      .push_slice(PROTOCOL_ID)
      .push_opcode(opcodes::all::OP_ENDIF)
      .into_script();

    assert_eq!(parse(&script), Vec::new());
  }

  #[test]
  fn empty_envelope() {
    assert_eq!(parse(&envelope(&[])), Vec::new());
  }

  #[test]
  fn wrong_protocol_identifier() {
    assert_eq!(parse(&envelope(&[b"foo"])), Vec::new());
  }

  #[test]
  fn non_push_op_terminates_the_envelope_without_emitting() {
    let script = script::Builder::new()
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(opcodes::all::OP_IF)
      .push_slice(PROTOCOL_ID)
      .push_opcode(opcodes::all::OP_CHECKSIG)
      .push_opcode(opcodes::all::OP_ENDIF)
      .into_script();

    assert_eq!(parse(&script), Vec::new());
  }

  #[test]
  fn incomplete_trailing_tag_is_dropped() {
    assert_eq!(
      parse(&envelope(&[&PROTOCOL_ID, &[99]])),
      vec![ParsedEnvelope { ..default() }],
    );
  }

  #[test]
  fn metadata_is_reassembled_from_chunks() {
    assert_eq!(
      parse(&envelope(&[&PROTOCOL_ID, &[5], &[0], &[5], &[1]])),
      vec![ParsedEnvelope {
        payload: Inscription {
          metadata: Some(vec![0, 1]),
          ..default()
        },
        ..default()
      }],
    );
  }

  #[test]
  fn multiple_parents_stay_separate() {
    assert_eq!(
      parse(&envelope(&[
        &PROTOCOL_ID,
        &[3],
        &inscription_id(1).value(),
        &[3],
        &inscription_id(2).value(),
      ])),
      vec![ParsedEnvelope {
        payload: Inscription {
          parents: vec![inscription_id(1).value(), inscription_id(2).value()],
          ..default()
        },
        ..default()
      }],
    );
  }

  #[test]
  fn pushnum_opcodes_mark_the_inscription_cursed() {
    const PUSHNUMS: &[(opcodes::Opcode, u8)] = &[
      (opcodes::all::OP_PUSHNUM_NEG1, 0x81),
      (opcodes::all::OP_PUSHNUM_1, 1),
      (opcodes::all::OP_PUSHNUM_8, 8),
      (opcodes::all::OP_PUSHNUM_16, 16),
    ];

    for &(op, value) in PUSHNUMS {
      let script = script::Builder::new()
        .push_opcode(opcodes::OP_FALSE)
        .push_opcode(opcodes::all::OP_IF)
        .push_slice(PROTOCOL_ID)
        .push_opcode(opcodes::OP_FALSE)
        .push_opcode(op)
        .push_opcode(opcodes::all::OP_ENDIF)
        .into_script();

      assert_eq!(
        parse(&script),
        vec![ParsedEnvelope {
          payload: Inscription {
            body: vec![value],
            cursed: true,
            ..default()
          },
          pushnum: true,
          ..default()
        }],
      );
    }
  }

  #[test]
  fn stuttering_marks_the_inscription_cursed() {
    let script = script::Builder::new()
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(opcodes::all::OP_IF)
      .push_slice(PROTOCOL_ID)
      .push_opcode(opcodes::all::OP_ENDIF)
      .into_script();

    assert_eq!(
      parse(&script),
      vec![ParsedEnvelope {
        payload: Inscription {
          cursed: true,
          ..default()
        },
        stutter: true,
        ..default()
      }],
    );

    let script = script::Builder::new()
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(opcodes::all::OP_IF)
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(opcodes::all::OP_IF)
      .push_slice(PROTOCOL_ID)
      .push_opcode(opcodes::all::OP_ENDIF)
      .into_script();

    assert_eq!(
      parse(&script),
      vec![ParsedEnvelope {
        payload: Inscription {
          cursed: true,
          ..default()
        },
        stutter: true,
        ..default()
      }],
    );

    let script = script::Builder::new()
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(opcodes::all::OP_AND)
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(opcodes::all::OP_IF)
      .push_slice(PROTOCOL_ID)
      .push_opcode(opcodes::all::OP_ENDIF)
      .into_script();

    assert_eq!(
      parse(&script),
      vec![ParsedEnvelope {
        payload: Inscription { ..default() },
        stutter: false,
        ..default()
      }],
    );
  }

  #[test]
  fn from_transaction_reads_tapscripts_and_records_inputs() {
    let tx = Transaction {
      version: Version(2),
      lock_time: LockTime::ZERO,
      input: vec![
        TxIn {
          previous_output: OutPoint::null(),
          script_sig: ScriptBuf::new(),
          sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
          witness: Witness::new(),
        },
        TxIn {
          previous_output: OutPoint::null(),
          script_sig: ScriptBuf::new(),
          sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
          witness: Witness::from_slice(&[
            inscription("text/plain;charset=utf-8", "ord")
              .to_script()
              .into_bytes(),
            Vec::new(),
          ]),
        },
      ],
      output: Vec::new(),
    };

    assert_eq!(
      ParsedEnvelope::from_transaction(&tx),
      vec![ParsedEnvelope {
        payload: inscription("text/plain;charset=utf-8", "ord"),
        input: 1,
        ..default()
      }],
    );
  }

  #[test]
  fn key_path_spends_are_ignored() {
    let tx = Transaction {
      version: Version(2),
      lock_time: LockTime::ZERO,
      input: vec![TxIn {
        previous_output: OutPoint::null(),
        script_sig: ScriptBuf::new(),
        sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
        witness: Witness::from_slice(&[envelope(&[&PROTOCOL_ID]).into_bytes()]),
      }],
      output: Vec::new(),
    };

    assert_eq!(ParsedEnvelope::from_transaction(&tx), Vec::new());
  }

  #[test]
  fn parse_witness_requires_three_elements() {
    assert_eq!(
      parse_witness(&Witness::from_slice(&[vec![0], vec![1]])),
      Err(Error::WitnessShape(2)),
    );

    assert_eq!(
      parse_witness(&Witness::from_slice(&[
        vec![0; 64],
        envelope(&[&PROTOCOL_ID, &[], b"ord"]).into_bytes(),
        vec![0xC0; 33],
      ])),
      Ok(vec![Inscription {
        body: b"ord".to_vec(),
        ..default()
      }]),
    );
  }

  #[test]
  fn round_trip_through_the_reveal_script() {
    let original = Inscription {
      body: b"hello".to_vec(),
      content_type: Some(b"text/plain;charset=utf-8".to_vec()),
      metadata: Some(vec![0xA0]),
      parents: vec![inscription_id(1).value(), inscription_id(2).value()],
      pointer: Some(Inscription::pointer_value(256)),
      unknown: vec![(vec![255], b"nop".to_vec())],
      ..default()
    };

    assert_eq!(
      parse(&original.to_script()),
      vec![ParsedEnvelope {
        payload: original,
        ..default()
      }],
    );
  }
}
