//! Translation of HAM10000 categorical codes into display labels.
//!
//! Lookups never fail: a code missing from its map passes through unchanged,
//! since later data releases may introduce new codes.

use super::model::{CellValue, Column, RawTable};

pub const DISPLAY_DX: &str = "Diagnóstico";
pub const DISPLAY_DX_TYPE: &str = "Método de Confirmação";
pub const DISPLAY_SEX: &str = "Sexo";
pub const DISPLAY_LOCALIZATION: &str = "Localização";

/// Column renames applied after value substitution.
const COLUMN_NAMES: &[(&str, &str)] = &[
    ("lesion_id", "ID da Lesão"),
    ("image_id", "ID da Imagem"),
    ("dx", DISPLAY_DX),
    ("dx_type", DISPLAY_DX_TYPE),
    ("age", "Idade"),
    ("sex", DISPLAY_SEX),
    ("localization", DISPLAY_LOCALIZATION),
];

const DIAGNOSIS: CodeMap = CodeMap::new(&[
    ("akiec", "Ceratose Actínica (akiec)"),
    ("bcc", "Carcinoma Basocelular (bcc)"),
    ("bkl", "Ceratose Benigna (bkl)"),
    ("df", "Dermatofibroma (df)"),
    ("mel", "Melanoma (mel)"),
    ("nv", "Nevo Melanocítico (nv)"),
    ("vasc", "Lesão Vascular (vasc)"),
]);

/// HMNIST `label` value → HAM10000 diagnosis code, in the release's class order.
pub const HMNIST_LABELS: CodeMap = CodeMap::new(&[
    ("0", "akiec"),
    ("1", "bcc"),
    ("2", "bkl"),
    ("3", "df"),
    ("4", "nv"),
    ("5", "vasc"),
    ("6", "mel"),
]);

const SEX: CodeMap = CodeMap::new(&[
    ("male", "Masculino"),
    ("female", "Feminino"),
    ("unknown", "Desconhecido"),
]);

const BODY_SITE: CodeMap = CodeMap::new(&[
    ("abdomen", "Abdômen"),
    ("acral", "Acral"),
    ("back", "Costas"),
    ("chest", "Peito"),
    ("ear", "Orelha"),
    ("face", "Rosto"),
    ("foot", "Pé"),
    ("genital", "Genital"),
    ("hand", "Mão"),
    ("lower extremity", "Membro Inferior"),
    ("neck", "Pescoço"),
    ("scalp", "Couro Cabeludo"),
    ("trunk", "Tronco"),
    ("upper extremity", "Membro Superior"),
    ("unknown", "Desconhecido"),
]);

const CONFIRMATION: CodeMap = CodeMap::new(&[
    ("histo", "Histopatologia"),
    ("follow_up", "Acompanhamento"),
    ("consensus", "Consenso"),
    ("confocal", "Microscopia Confocal"),
]);

/// Fixed code → label mapping with identity fallback.
#[derive(Debug, Clone, Copy)]
pub struct CodeMap {
    entries: &'static [(&'static str, &'static str)],
}

impl CodeMap {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { entries }
    }

    pub fn get(&self, code: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == code)
            .map(|(_, label)| *label)
    }

    /// Label for `code`, or `code` itself when it is not mapped.
    pub fn lookup<'a>(&self, code: &'a str) -> &'a str {
        self.get(code).unwrap_or(code)
    }

    /// Translate a cell. Non-string cells and unknown codes are returned as-is.
    pub fn translate(&self, value: &CellValue) -> CellValue {
        match value {
            CellValue::String(code) => CellValue::String(self.lookup(code).to_string()),
            other => other.clone(),
        }
    }
}

/// The four categorical HAM10000 fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalField {
    Diagnosis,
    Sex,
    BodySite,
    ConfirmationMethod,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 4] = [
        CategoricalField::Diagnosis,
        CategoricalField::Sex,
        CategoricalField::BodySite,
        CategoricalField::ConfirmationMethod,
    ];

    pub fn raw_column(self) -> &'static str {
        match self {
            CategoricalField::Diagnosis => "dx",
            CategoricalField::Sex => "sex",
            CategoricalField::BodySite => "localization",
            CategoricalField::ConfirmationMethod => "dx_type",
        }
    }

    pub fn display_column(self) -> &'static str {
        display_name(self.raw_column())
    }

    pub fn code_map(self) -> CodeMap {
        match self {
            CategoricalField::Diagnosis => DIAGNOSIS,
            CategoricalField::Sex => SEX,
            CategoricalField::BodySite => BODY_SITE,
            CategoricalField::ConfirmationMethod => CONFIRMATION,
        }
    }

    fn for_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.raw_column() == name)
    }
}

/// Diagnosis label of an HMNIST class value, e.g. `4` → "Nevo Melanocítico (nv)".
/// Values outside the seven classes are shown as themselves.
pub fn hmnist_label_name(value: &CellValue) -> String {
    value
        .as_i64()
        .and_then(|v| HMNIST_LABELS.get(&v.to_string()))
        .map_or_else(|| value.to_string(), |dx| DIAGNOSIS.lookup(dx).to_string())
}

/// Display name of a raw column, or the name itself when it has none.
pub fn display_name(column: &str) -> &str {
    COLUMN_NAMES
        .iter()
        .find(|(raw, _)| *raw == column)
        .map_or(column, |(_, display)| *display)
}

/// Translate the categorical columns of `table` and rename known columns.
///
/// Each column is handled on its own, so the result does not depend on the
/// order of the fields. The input table is left untouched.
pub fn normalize(table: &RawTable) -> RawTable {
    table.map_columns(|column| {
        let values = match CategoricalField::for_column(&column.name) {
            Some(field) => {
                let map = field.code_map();
                column.values.iter().map(|v| map.translate(v)).collect()
            }
            None => column.values.clone(),
        };
        Column::new(display_name(&column.name), values)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> RawTable {
        RawTable::new(vec![
            Column::new("lesion_id", vec!["HAM_0000118".into(), "HAM_0002730".into()]),
            Column::new("dx", vec!["nv".into(), "xyz".into()]),
            Column::new("dx_type", vec!["histo".into(), "consensus".into()]),
            Column::new("age", vec![80.0.into(), CellValue::Null]),
            Column::new("sex", vec!["male".into(), "unknown".into()]),
            Column::new("localization", vec!["scalp".into(), "lower extremity".into()]),
            Column::new("dataset", vec!["vidir_modern".into(), "rosendahl".into()]),
        ])
        .unwrap()
    }

    #[test]
    fn translates_codes_and_renames_columns() {
        let out = normalize(&metadata());
        let dx = out.column("Diagnóstico").unwrap();
        assert_eq!(dx.values[0], CellValue::String("Nevo Melanocítico (nv)".into()));
        assert_eq!(
            out.column("Sexo").unwrap().values[0],
            CellValue::String("Masculino".into())
        );
        assert_eq!(
            out.column("Localização").unwrap().values[1],
            CellValue::String("Membro Inferior".into())
        );
        assert_eq!(
            out.column("Método de Confirmação").unwrap().values[0],
            CellValue::String("Histopatologia".into())
        );
        assert!(out.column("dx").is_none());
    }

    #[test]
    fn unknown_codes_pass_through() {
        let out = normalize(&metadata());
        assert_eq!(
            out.column("Diagnóstico").unwrap().values[1],
            CellValue::String("xyz".into())
        );
        assert_eq!(DIAGNOSIS.lookup("new-code"), "new-code");
        assert_eq!(SEX.translate(&CellValue::Integer(1)), CellValue::Integer(1));
    }

    #[test]
    fn hmnist_labels_name_their_diagnosis() {
        assert_eq!(hmnist_label_name(&CellValue::Integer(0)), "Ceratose Actínica (akiec)");
        assert_eq!(hmnist_label_name(&CellValue::Integer(4)), "Nevo Melanocítico (nv)");
        assert_eq!(hmnist_label_name(&CellValue::Float(6.0)), "Melanoma (mel)");
        for label in 0..7 {
            let name = hmnist_label_name(&CellValue::Integer(label));
            assert!(name.ends_with(')'), "{label} → {name}");
        }
        assert_eq!(hmnist_label_name(&CellValue::Integer(9)), "9");
        assert_eq!(hmnist_label_name(&CellValue::String("x".into())), "x");
    }

    #[test]
    fn unmapped_columns_keep_name_and_values() {
        let input = metadata();
        let out = normalize(&input);
        assert_eq!(out.column("dataset"), input.column("dataset"));
        assert_eq!(out.column("Idade").unwrap().values, input.column("age").unwrap().values);
        assert_eq!(out.shape(), input.shape());
    }

    #[test]
    fn input_is_not_mutated() {
        let input = metadata();
        let copy = input.clone();
        let _ = normalize(&input);
        assert_eq!(input, copy);
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let once = normalize(&metadata());
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn column_order_does_not_matter() {
        let t = metadata();
        let mut reversed: Vec<Column> = t.columns().to_vec();
        reversed.reverse();
        let r = normalize(&RawTable::new(reversed).unwrap());
        let n = normalize(&t);
        for col in n.columns() {
            assert_eq!(r.column(&col.name), Some(col));
        }
    }
}
