use super::*;

/// Builds the taproot leaf script that reveals `inscriptions` and is
/// spendable by `pubkey`: the key push and `OP_CHECKSIG`, followed by one
/// envelope per inscription.
pub fn p2tr_ord_reveal(pubkey: [u8; 32], inscriptions: &[Inscription]) -> ScriptBuf {
  let mut builder = script::Builder::new()
    .push_slice(pubkey)
    .push_opcode(opcodes::all::OP_CHECKSIG);

  for inscription in inscriptions {
    builder = inscription.append_reveal_script_to_builder(builder);
  }

  builder.into_script()
}

/// A recognized inscription-reveal leaf script.
///
/// `recognize` is the strict counterpart of the envelope scan: the script
/// must consist of exactly the key push, `OP_CHECKSIG`, and contiguous
/// canonical envelopes, or it is not a reveal script at all. It never
/// fails loudly, so other script recognizers can take their turn.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Eq)]
pub struct OrdinalReveal {
  pub pubkey: [u8; 32],
  pub inscriptions: Vec<Inscription>,
}

impl OrdinalReveal {
  pub fn new(pubkey: [u8; 32], inscriptions: Vec<Inscription>) -> Self {
    Self {
      pubkey,
      inscriptions,
    }
  }

  /// The leaf script for this descriptor.
  pub fn reveal_script(&self) -> ScriptBuf {
    p2tr_ord_reveal(self.pubkey, &self.inscriptions)
  }

  pub fn recognize(script: &Script) -> Option<Self> {
    let instructions = script
      .instructions()
      .collect::<Result<Vec<Instruction>, script::Error>>()
      .ok()?;

    let Some(Instruction::PushBytes(pubkey)) = instructions.first() else {
      return None;
    };

    let pubkey: [u8; 32] = pubkey.as_bytes().try_into().ok()?;

    if instructions.get(1) != Some(&Instruction::Op(opcodes::all::OP_CHECKSIG)) {
      return None;
    }

    let mut inscriptions = Vec::new();
    let mut position = 2;

    while position < instructions.len() {
      if instructions.get(position) != Some(&Instruction::PushBytes((&[]).into()))
        || instructions.get(position + 1) != Some(&Instruction::Op(opcodes::all::OP_IF))
      {
        return None;
      }

      let Some(Instruction::PushBytes(protocol)) = instructions.get(position + 2) else {
        return None;
      };

      if protocol.as_bytes() != envelope::PROTOCOL_ID {
        return None;
      }

      position += 3;

      let mut payload = Vec::new();

      loop {
        match instructions.get(position)? {
          Instruction::Op(op) if *op == opcodes::all::OP_ENDIF => {
            position += 1;
            break;
          }
          Instruction::PushBytes(push) => {
            payload.push(push.as_bytes().to_vec());
            position += 1;
          }
          Instruction::Op(_) => return None,
        }
      }

      let envelope = RawEnvelope {
        input: 0,
        offset: inscriptions.len().try_into().unwrap(),
        payload,
        pushnum: false,
        stutter: false,
      };

      inscriptions.push(ParsedEnvelope::from(envelope).payload);
    }

    Some(Self {
      pubkey,
      inscriptions,
    })
  }

  /// Assembles the two-element witness stack for a script-path spend of
  /// this reveal: the lone signature and the leaf script. The control
  /// block is appended by the spending machinery. Requires exactly one
  /// signature, made for this descriptor's key.
  pub fn finalize_taproot(
    &self,
    leaf_script: &Script,
    signatures: &[([u8; 32], Vec<u8>)],
  ) -> Option<[Vec<u8>; 2]> {
    let [(pubkey, signature)] = signatures else {
      return None;
    };

    if *pubkey != self.pubkey {
      return None;
    }

    Some([signature.clone(), leaf_script.to_bytes()])
  }
}
