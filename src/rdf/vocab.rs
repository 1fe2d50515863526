//! Vocabulary IRIs used by the fact reader.
//!
//! CRM property names contain hyphens (`P4_has_time-span`); the IRIs are
//! spelled out verbatim rather than assembled from QName parts.

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const OWL_SAME_AS: &str = "http://www.w3.org/2002/07/owl#sameAs";

const CRM: &str = "http://www.cidoc-crm.org/cidoc-crm/";

macro_rules! crm {
    ($name:ident, $local:literal) => {
        pub const $name: &str = concat!("http://www.cidoc-crm.org/cidoc-crm/", $local);
    };
}

crm!(E21_PERSON, "E21_Person");
crm!(E52_TIME_SPAN, "E52_Time-Span");
crm!(E53_PLACE, "E53_Place");
crm!(E67_BIRTH, "E67_Birth");
crm!(E69_DEATH, "E69_Death");
crm!(E85_JOINING, "E85_Joining");
crm!(E7_ACTIVITY, "E7_Activity");

crm!(P1_IS_IDENTIFIED_BY, "P1_is_identified_by");
crm!(P4_HAS_TIME_SPAN, "P4_has_time-span");
crm!(P7_TOOK_PLACE_AT, "P7_took_place_at");
crm!(P11_HAD_PARTICIPANT, "P11_had_participant");
crm!(P14_CARRIED_OUT_BY, "P14_carried_out_by");
crm!(P82_AT_SOME_TIME_WITHIN, "P82_at_some_time_within");
crm!(P82A_BEGIN_OF_THE_BEGIN, "P82a_begin_of_the_begin");
crm!(P82B_END_OF_THE_END, "P82b_end_of_the_end");
crm!(P89_FALLS_WITHIN, "P89_falls_within");
crm!(P96_BY_MOTHER, "P96_by_mother");
crm!(P97_FROM_FATHER, "P97_from_father");
crm!(P98_BROUGHT_INTO_LIFE, "P98_brought_into_life");
crm!(P100_WAS_DEATH_OF, "P100_was_death_of");
crm!(P143_JOINED, "P143_joined");
crm!(P168_PLACE_IS_DEFINED_BY, "P168_place_is_defined_by");

/// Namespace prefix for assembling test data and diagnostics.
pub fn crm_namespace() -> &'static str {
    CRM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyphenated_properties_keep_their_hyphen() {
        assert!(P4_HAS_TIME_SPAN.ends_with("P4_has_time-span"));
        assert!(E52_TIME_SPAN.ends_with("E52_Time-Span"));
    }
}
