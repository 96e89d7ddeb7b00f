//! System directive selection
//!
//! The question is scanned for technical-support vocabulary first, then for
//! human-resources vocabulary. The first category with a hit wins.

use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_DIRECTIVE: &str = "\
Você é um assistente de IA corporativo útil, conciso e profissional.
Sua função é auxiliar os funcionários da empresa com informações precisas e relevantes.

Siga estas diretrizes em suas respostas:
1. Seja claro, objetivo e direto ao ponto.
2. Mantenha um tom profissional e respeitoso.
3. Quando não souber a resposta, admita claramente em vez de inventar informações.
4. Evite respostas excessivamente longas ou técnicas, a menos que solicitado.
5. Não compartilhe informações sensíveis ou confidenciais.
6. Não faça suposições sobre informações internas da empresa que não foram mencionadas.
7. Formate suas respostas de forma organizada, usando marcadores quando apropriado.

Seu objetivo é ser um recurso valioso para os funcionários, ajudando-os a serem mais produtivos e bem informados.";

const TECHNICAL_DIRECTIVE: &str = "\
Você é um assistente técnico especializado em TI e sistemas corporativos.
Sua função é fornecer suporte técnico e orientações claras para os funcionários da empresa.

Siga estas diretrizes em suas respostas:
1. Seja preciso e técnico, mas explique conceitos de forma acessível.
2. Forneça instruções passo a passo quando apropriado.
3. Sugira soluções práticas para problemas técnicos comuns.
4. Quando relevante, mencione considerações de segurança.
5. Não recomende práticas que possam comprometer a segurança dos sistemas.
6. Evite jargão excessivo e explique termos técnicos quando necessário.

Seu objetivo é ajudar os funcionários a resolver problemas técnicos e entender melhor os sistemas da empresa.";

const HR_DIRECTIVE: &str = "\
Você é um assistente especializado em recursos humanos e políticas corporativas.
Sua função é fornecer informações gerais sobre práticas de RH e políticas empresariais.

Siga estas diretrizes em suas respostas:
1. Forneça informações gerais sobre práticas comuns de RH e políticas corporativas.
2. Esclareça que suas respostas são orientações gerais e não substituem as políticas específicas da empresa.
3. Recomende que o funcionário consulte o departamento de RH ou o manual da empresa para informações específicas.
4. Mantenha um tom neutro e profissional ao discutir questões sensíveis.
5. Não faça interpretações legais ou dê conselhos jurídicos.

Seu objetivo é ajudar os funcionários a entender melhor as práticas gerais de RH e políticas corporativas.";

const TECHNICAL_KEYWORDS: &[&str] = &[
    "computador", "sistema", "software", "hardware", "rede", "servidor",
    "erro", "bug", "código", "programação", "tecnologia", "ti", "internet",
    "aplicativo", "app", "instalação", "configuração", "senha", "login",
    "email", "e-mail", "vpn", "banco de dados", "sql", "python", "java",
    "javascript", "html", "css", "api", "cloud", "nuvem", "azure", "aws",
];

const HR_KEYWORDS: &[&str] = &[
    "rh", "recursos humanos", "férias", "folga", "salário", "contrato",
    "benefício", "vaga", "recrutamento", "seleção", "treinamento",
    "desenvolvimento", "avaliação", "desempenho", "promoção", "demissão",
    "rescisão", "contratação", "entrevista", "currículo", "cv", "política",
    "norma", "regra", "conduta", "código de ética", "assédio", "diversidade",
    "inclusão", "licença", "atestado", "ponto", "hora extra", "remuneração",
];

/// Which system directive steers the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Default,
    Technical,
    Hr,
}

impl DirectiveKind {
    /// The directive text placed inside the `<<SYS>>` block
    pub fn text(&self) -> &'static str {
        match self {
            Self::Default => DEFAULT_DIRECTIVE,
            Self::Technical => TECHNICAL_DIRECTIVE,
            Self::Hr => HR_DIRECTIVE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Technical => "technical",
            Self::Hr => "hr",
        }
    }

    /// Lenient lookup used when reading stored records; unknown names map to `Default`
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "technical" => Self::Technical,
            "hr" => Self::Hr,
            _ => Self::Default,
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Default => &[],
            Self::Technical => TECHNICAL_KEYWORDS,
            Self::Hr => HR_KEYWORDS,
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the directive for a raw question.
pub fn detect_directive(question: &str) -> DirectiveKind {
    let lowered = question.to_lowercase();
    let words = tokenize(&lowered);

    for kind in [DirectiveKind::Technical, DirectiveKind::Hr] {
        if kind.keywords().iter().any(|kw| contains_keyword(&words, kw)) {
            return kind;
        }
    }
    DirectiveKind::Default
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Keywords shorter than this only match as whole words.
const SHORT_KEYWORD_CHARS: usize = 4;

/// Multi-word and hyphenated keywords match a contiguous run of words.
fn contains_keyword(words: &[&str], keyword: &str) -> bool {
    let parts: Vec<&str> = keyword
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() || parts.len() > words.len() {
        return false;
    }
    words
        .windows(parts.len())
        .any(|window| window.iter().zip(&parts).all(|(w, p)| word_matches(w, p)))
}

/// Long keywords match anywhere inside a word (compounds, prefixes, digits);
/// short ones match the whole word, optionally pluralized.
fn word_matches(word: &str, keyword: &str) -> bool {
    if keyword.chars().count() >= SHORT_KEYWORD_CHARS {
        return word.contains(keyword);
    }
    matches!(word.strip_prefix(keyword), Some("") | Some("s") | Some("es"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technical_keyword() {
        assert_eq!(detect_directive("O servidor caiu de novo"), DirectiveKind::Technical);
        assert_eq!(detect_directive("Como acesso a VPN de casa?"), DirectiveKind::Technical);
    }

    #[test]
    fn test_hr_keyword() {
        assert_eq!(detect_directive("Quando posso tirar férias?"), DirectiveKind::Hr);
        assert_eq!(detect_directive("Quero falar com Recursos Humanos"), DirectiveKind::Hr);
    }

    #[test]
    fn test_default_when_nothing_matches() {
        assert_eq!(detect_directive("Qual a capital da França?"), DirectiveKind::Default);
        assert_eq!(detect_directive(""), DirectiveKind::Default);
    }

    #[test]
    fn test_technical_wins_over_hr() {
        assert_eq!(
            detect_directive("Minhas férias não aparecem no sistema"),
            DirectiveKind::Technical
        );
    }

    #[test]
    fn test_whole_word_matching() {
        // "ti" and "app" must not fire inside unrelated words
        assert_eq!(detect_directive("Gostaria de tirar uma dúvida"), DirectiveKind::Default);
        assert_eq!(detect_directive("Aplaudo a apresentação"), DirectiveKind::Default);
        assert_eq!(detect_directive("Falar com a TI"), DirectiveKind::Technical);
    }

    #[test]
    fn test_plural_and_hyphenated_forms() {
        assert_eq!(detect_directive("Os servidores estão lentos"), DirectiveKind::Technical);
        assert_eq!(detect_directive("Não recebo e-mail"), DirectiveKind::Technical);
        assert_eq!(detect_directive("Quais benefícios temos?"), DirectiveKind::Hr);
    }

    #[test]
    fn test_compound_and_prefixed_words() {
        assert_eq!(detect_directive("O servidor-web caiu"), DirectiveKind::Technical);
        assert_eq!(detect_directive("Reinicie o servidor2"), DirectiveKind::Technical);
        assert_eq!(detect_directive("Problema no subservidor"), DirectiveKind::Technical);
        assert_eq!(detect_directive("Dúvida sobre pré-férias"), DirectiveKind::Hr);
        assert_eq!(detect_directive("Meu email-corporativo sumiu"), DirectiveKind::Technical);
    }

    #[test]
    fn test_multi_word_keyword() {
        assert_eq!(detect_directive("Onde vejo o código de ética?"), DirectiveKind::Technical);
        assert_eq!(detect_directive("Como registro hora extra?"), DirectiveKind::Hr);
        assert_eq!(detect_directive("Perdi o banco de dados"), DirectiveKind::Technical);
    }

    #[test]
    fn test_texts_are_distinct() {
        assert_ne!(DirectiveKind::Default.text(), DirectiveKind::Technical.text());
        assert_ne!(DirectiveKind::Technical.text(), DirectiveKind::Hr.text());
        assert!(DirectiveKind::Hr.text().contains("recursos humanos"));
    }

    #[test]
    fn test_name_round_trip() {
        for kind in [DirectiveKind::Default, DirectiveKind::Technical, DirectiveKind::Hr] {
            assert_eq!(DirectiveKind::from_name(kind.as_str()), kind);
        }
        assert_eq!(DirectiveKind::from_name("legal"), DirectiveKind::Default);
    }
}
