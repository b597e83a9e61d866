use super::*;

pub(crate) fn default<T: Default>() -> T {
  Default::default()
}

pub(crate) fn txid(n: u64) -> Txid {
  let hex = format!("{n:x}");

  if hex.is_empty() || hex.len() > 1 {
    panic!();
  }

  hex.repeat(64).parse().unwrap()
}

pub(crate) fn inscription_id(n: u32) -> InscriptionId {
  let hex = format!("{n:x}");

  if hex.is_empty() || hex.len() > 1 {
    panic!();
  }

  format!("{}i{n}", hex.repeat(64)).parse().unwrap()
}

pub(crate) fn inscription(content_type: &str, body: impl AsRef<[u8]>) -> Inscription {
  Inscription {
    content_type: Some(content_type.into()),
    body: body.as_ref().to_vec(),
    ..default()
  }
}

pub(crate) fn envelope(payload: &[&[u8]]) -> ScriptBuf {
  let mut builder = script::Builder::new()
    .push_opcode(opcodes::OP_FALSE)
    .push_opcode(opcodes::all::OP_IF);

  for data in payload {
    let data: &script::PushBytes = (*data).try_into().unwrap();
    builder = builder.push_slice(data);
  }

  builder.push_opcode(opcodes::all::OP_ENDIF).into_script()
}
